use clap::{arg, Command, ValueEnum};
use k8s_openapi::api::core::v1::Endpoints;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use slices::{endpoint_slice_from_endpoints, V1Provider};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Output {
    #[clap(alias = "yml")]
    Yaml,
    Json,
}

#[derive(Debug, Error)]
enum Error {
    #[error("Unable to read Endpoints manifest: {0}")]
    IO(std::io::Error),

    #[error("Unable to deserialize Endpoints manifest: {0}")]
    Parse(serde_yml::Error),

    #[error("Unable to serialize EndpointSlice as YAML: {0}")]
    Yaml(serde_yml::Error),

    #[error("Unable to serialize EndpointSlice as JSON: {0}")]
    Json(serde_json::Error),
}

fn cli() -> Command {
    Command::new("slices")
        .about("Convert Endpoints manifests into EndpointSlices")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("convert")
                .about("Print the EndpointSlice mirrored from an Endpoints manifest")
                .arg(
                    arg!(<FILE>)
                        .help("Endpoints manifest, YAML or JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    arg!(-o --output <FORMAT>)
                        .value_parser(clap::value_parser!(Output))
                        .default_value("yaml")
                        .required(false),
                ),
        )
        .subcommand(Command::new("kind").about("Print the kind of object written by the mirror"))
}

fn convert(filename: &PathBuf, output: Output) -> Result<String, Error> {
    let file = File::open(filename).map_err(Error::IO)?;
    let endpoints: Endpoints = serde_yml::from_reader(file).map_err(Error::Parse)?;
    let slice: EndpointSlice = endpoint_slice_from_endpoints(&endpoints);
    match output {
        Output::Yaml => serde_yml::to_string(&slice).map_err(Error::Yaml),
        Output::Json => serde_json::to_string_pretty(&slice).map_err(Error::Json),
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("convert", sub_matches)) => {
            let Some(filename) = sub_matches.get_one::<PathBuf>("FILE") else {
                unreachable!()
            };
            let output = sub_matches
                .get_one::<Output>("output")
                .copied()
                .unwrap_or(Output::Yaml);
            match convert(filename, output) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        Some(("kind", _)) => {
            let provider = V1Provider;
            println!("{}/{}", provider.api_version(), provider.kind());
        }
        _ => unreachable!(),
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML_MANIFEST: &str = r#"
apiVersion: v1
kind: Endpoints
metadata:
  name: kubernetes
  namespace: default
subsets:
  - addresses:
      - ip: 10.0.0.1
        nodeName: node-a
    notReadyAddresses:
      - ip: 10.0.0.2
    ports:
      - name: https
        port: 443
        protocol: TCP
"#;

    const JSON_MANIFEST: &str = r#"{
  "apiVersion": "v1",
  "kind": "Endpoints",
  "metadata": {"name": "kubernetes", "namespace": "default"},
  "subsets": [{
    "addresses": [{"ip": "fe80::1"}],
    "ports": [{"name": "https", "port": 443, "protocol": "TCP"}]
  }]
}"#;

    fn manifest(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn expected(contents: &str) -> EndpointSlice {
        let endpoints: Endpoints = serde_yml::from_str(contents).unwrap();
        endpoint_slice_from_endpoints(&endpoints)
    }

    #[test]
    fn converts_yaml_manifest() {
        let file = manifest(YAML_MANIFEST);
        let path = file.path().to_path_buf();

        let yaml = convert(&path, Output::Yaml).unwrap();
        let from_yaml: EndpointSlice = serde_yml::from_str(&yaml).unwrap();
        let json = convert(&path, Output::Json).unwrap();
        let from_json: EndpointSlice = serde_json::from_str(&json).unwrap();

        assert_eq!(from_yaml, expected(YAML_MANIFEST));
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_yaml.address_type, "IPv4");
        assert_eq!(from_yaml.endpoints.len(), 2);
        assert_eq!(from_yaml.endpoints[0].node_name.as_deref(), Some("node-a"));
    }

    #[test]
    fn converts_json_manifest() {
        let file = manifest(JSON_MANIFEST);
        let path = file.path().to_path_buf();

        let json = convert(&path, Output::Json).unwrap();
        let slice: EndpointSlice = serde_json::from_str(&json).unwrap();

        assert_eq!(slice, expected(JSON_MANIFEST));
        assert_eq!(slice.address_type, "IPv6");
        assert_eq!(slice.endpoints[0].addresses, vec!["fe80::1".to_string()]);
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let missing = PathBuf::from("/nonexistent/endpoints.yaml");
        assert!(matches!(convert(&missing, Output::Yaml), Err(Error::IO(_))));

        let file = manifest("subsets: [not, a, subset");
        assert!(matches!(
            convert(&file.path().to_path_buf(), Output::Yaml),
            Err(Error::Parse(_))
        ));
    }
}
