//! # telesim-model
//!
//! Request descriptors for the telesim engine and request-file loading.
//!
//! A request file is YAML or JSON (chosen by extension) holding either a
//! single request:
//!
//! ```yaml
//! task: ber
//! modulation: 16qam
//! channel: rayleigh
//! snr_db_list: [0, 5, 10]
//! ```
//!
//! or a batch:
//!
//! ```yaml
//! requests:
//!   - task: constellation
//!   - task: multi_radio_map
//!     combine_mode: sum
//! ```

mod error;
mod request;

pub use error::ModelError;
pub use request::{
    AntennaSpec, BerParams, ConstellationParams, MimoParams, MultiRadioMapParams, RadioMapParams,
    SimulationRequest,
};

use serde::Deserialize;
use std::path::Path;

/// Contents of a request file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RequestFile {
    /// `{ requests: [...] }`
    Batch {
        /// Requests, processed in order.
        requests: Vec<SimulationRequest>,
    },
    /// A single request at the top level.
    Single(SimulationRequest),
}

impl RequestFile {
    /// Flatten into an ordered list of requests.
    pub fn into_requests(self) -> Vec<SimulationRequest> {
        match self {
            RequestFile::Batch { requests } => requests,
            RequestFile::Single(request) => vec![request],
        }
    }
}

/// Serialization format of a request file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    Yaml,
    Json,
}

impl RequestFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Ok(RequestFormat::Yaml),
            Some("json") => Ok(RequestFormat::Json),
            _ => Err(ModelError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse request text in the given format.
pub fn parse_requests(text: &str, format: RequestFormat) -> Result<Vec<SimulationRequest>, ModelError> {
    let file: RequestFile = match format {
        RequestFormat::Yaml => serde_yaml::from_str(text)?,
        RequestFormat::Json => serde_json::from_str(text)?,
    };
    let requests = file.into_requests();
    if requests.is_empty() {
        return Err(ModelError::InvalidRequest("request file contains no requests".to_string()));
    }
    Ok(requests)
}

/// Load every request from a YAML or JSON file.
pub fn load_requests<P: AsRef<Path>>(path: P) -> Result<Vec<SimulationRequest>, ModelError> {
    let path = path.as_ref();
    let format = RequestFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_requests(&text, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_single_request_file() {
        let requests = parse_requests("task: constellation\nsnr_db: 20\n", RequestFormat::Yaml).unwrap();
        assert_eq!(requests.len(), 1);
        let SimulationRequest::Constellation(p) = &requests[0] else {
            panic!("wrong variant");
        };
        assert_eq!(p.snr_db, 20.0);
        assert_eq!(p.modulation, "16qam");
    }

    #[test]
    fn test_batch_request_file() {
        let yaml = "requests:\n  - task: ber\n  - task: radiomap\n    rx_grid_size: 8\n";
        let requests = parse_requests(yaml, RequestFormat::Yaml).unwrap();
        let tasks: Vec<&str> = requests.iter().map(|r| r.task()).collect();
        assert_eq!(tasks, ["ber", "radiomap"]);
    }

    #[test]
    fn test_json_batch() {
        let json = r#"{"requests": [{"task": "multi_radio_map", "combine_mode": "sum"}]}"#;
        let requests = parse_requests(json, RequestFormat::Json).unwrap();
        assert_eq!(requests[0].task(), "multi_radio_map");
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            parse_requests("requests: []", RequestFormat::Yaml),
            Err(ModelError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(RequestFormat::from_path(&PathBuf::from("a.yaml")).unwrap(), RequestFormat::Yaml);
        assert_eq!(RequestFormat::from_path(&PathBuf::from("a.YML")).unwrap(), RequestFormat::Yaml);
        assert_eq!(RequestFormat::from_path(&PathBuf::from("a.json")).unwrap(), RequestFormat::Json);
        assert!(RequestFormat::from_path(&PathBuf::from("a.toml")).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_requests("/nonexistent/telesim/requests.yaml").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("telesim_model_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"task": "ber", "n_bits": 1000}"#).unwrap();
        let requests = load_requests(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let SimulationRequest::Ber(p) = &requests[0] else {
            panic!("wrong variant");
        };
        assert_eq!(p.n_bits, 1000);
    }
}
