use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::DomainError, scale::ScaleCatalog};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Yaml,
}

impl DataFormat {
    /// Guesses the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => DataFormat::Yaml,
            _ => DataFormat::Json,
        }
    }
}

pub fn encode_catalog(catalog: &ScaleCatalog, format: DataFormat) -> Result<Vec<u8>, DomainError> {
    match format {
        DataFormat::Json => serde_json::to_vec_pretty(catalog)
            .map_err(|err| DomainError::serialization(err.to_string())),
        DataFormat::Yaml => serde_yaml::to_string(catalog)
            .map(String::into_bytes)
            .map_err(|err| DomainError::serialization(err.to_string())),
    }
}

pub fn decode_catalog(bytes: &[u8], format: DataFormat) -> Result<ScaleCatalog, DomainError> {
    match format {
        DataFormat::Json => serde_json::from_slice(bytes)
            .map_err(|err| DomainError::serialization(err.to_string())),
        DataFormat::Yaml => serde_yaml::from_slice(bytes)
            .map_err(|err| DomainError::serialization(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(DataFormat::from_path(Path::new("scales.yml")), DataFormat::Yaml);
        assert_eq!(DataFormat::from_path(Path::new("scales.json")), DataFormat::Json);
        assert_eq!(DataFormat::from_path(Path::new("scales")), DataFormat::Json);
    }

    #[test]
    fn yaml_catalog_keeps_order() {
        let yaml = "- keynote: D\n  scales:\n    - name: major\n      chords: [D, G, A]\n- keynote: A\n  scales: []\n";
        let catalog = decode_catalog(yaml.as_bytes(), DataFormat::Yaml).unwrap();
        assert_eq!(catalog.keynotes()[0].keynote, "D");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn exports_builtin_as_json() {
        let bytes = encode_catalog(&ScaleCatalog::builtin(), DataFormat::Json).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"keynote\": \"F#\""));
        assert!(output.contains("\"harmonic_minor\""));
    }

    #[test]
    fn decode_reports_invalid_catalogs() {
        let dup = r#"[{"keynote": "C", "scales": []}, {"keynote": "C", "scales": []}]"#;
        assert!(decode_catalog(dup.as_bytes(), DataFormat::Json).is_err());
        assert!(decode_catalog(b"not json", DataFormat::Json).is_err());
    }
}
