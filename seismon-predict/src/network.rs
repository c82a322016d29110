//! Station network profiles
//!
//! Each station belongs to one catalogue network. The mapping is resolved
//! once per station; unknown stations use the LHO network.

use std::fmt;
use std::path::{Path, PathBuf};

use seismon_common::db::Station;

/// Catalogue network a station draws its historical events from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkProfile {
    Llo,
    Lho,
    Virgo,
}

impl NetworkProfile {
    /// Network for a station name; anything unrecognized maps to LHO
    pub fn for_station(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LLO" => NetworkProfile::Llo,
            "VIRGO" => NetworkProfile::Virgo,
            _ => NetworkProfile::Lho,
        }
    }

    /// Database table holding this network's catalogue
    pub fn catalogue_table(&self) -> &'static str {
        match self {
            NetworkProfile::Llo => "llo_catalogues",
            NetworkProfile::Lho => "lho_catalogues",
            NetworkProfile::Virgo => "virgo_catalogues",
        }
    }

    /// Network whose bundled CSV backs this catalogue
    ///
    /// Virgo has no bundled file of its own and shares the LHO one.
    pub fn fallback_network(&self) -> NetworkProfile {
        match self {
            NetworkProfile::Llo => NetworkProfile::Llo,
            NetworkProfile::Lho | NetworkProfile::Virgo => NetworkProfile::Lho,
        }
    }

    /// Bundled CSV for this catalogue inside `directory`
    pub fn fallback_file(&self, directory: &Path) -> PathBuf {
        directory.join(format!(
            "{}_processed_USGS_global_EQ_catalogue.csv",
            self.fallback_network().code()
        ))
    }

    pub fn code(&self) -> &'static str {
        match self {
            NetworkProfile::Llo => "LLO",
            NetworkProfile::Lho => "LHO",
            NetworkProfile::Virgo => "VIRGO",
        }
    }

    pub fn all() -> [NetworkProfile; 3] {
        [NetworkProfile::Llo, NetworkProfile::Lho, NetworkProfile::Virgo]
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Station with its resolved network
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredStation {
    pub station: Station,
    pub network: NetworkProfile,
}

impl From<Station> for MonitoredStation {
    fn from(station: Station) -> Self {
        let network = NetworkProfile::for_station(&station.name);
        Self { station, network }
    }
}

/// Fixed registry of monitored sites, upserted at every startup
pub fn station_registry() -> Vec<Station> {
    [
        ("LHO", 46.6475, -119.5986),
        ("LLO", 30.4986, -90.7483),
        ("GEO", 52.246944, 9.80833),
        ("VIRGO", 43.631389, 10.505),
        ("KAGRA", 36.4119, 137.3058),
    ]
    .into_iter()
    .map(|(name, lat, lon)| Station {
        name: name.to_string(),
        lat,
        lon,
    })
    .collect()
}
