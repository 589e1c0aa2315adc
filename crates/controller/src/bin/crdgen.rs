//! # CRD Generator
//!
//! Generates Kubernetes CustomResourceDefinition (CRD) YAML from the Rust type
//! definitions in the library.
//!
//! ## Usage
//!
//! ```bash
//! # Generate every CRD
//! cargo run --bin crdgen > config/crd/lifecycle.yaml
//!
//! # Generate one kind and apply directly
//! cargo run --bin crdgen -- --kind ProviderConfig | kubectl apply -f -
//! ```

use clap::Parser;
use kube::core::CustomResourceExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use lifecycle_controller::crd::{
    CompositeResource, CompositeResourceClaim, ManagedResource, ProviderConfig,
    ProviderConfigUsage,
};

#[derive(Parser, Debug)]
#[command(name = "crdgen", about = "Print the lifecycle controller CRDs as YAML")]
struct Args {
    /// Only print the CRD for this kind (e.g. ProviderConfig)
    #[arg(long)]
    kind: Option<String>,
}

fn crds() -> Vec<CustomResourceDefinition> {
    vec![
        ProviderConfig::crd(),
        ProviderConfigUsage::crd(),
        ManagedResource::crd(),
        CompositeResource::crd(),
        CompositeResourceClaim::crd(),
    ]
}

fn main() {
    let args = Args::parse();

    let selected: Vec<_> = crds()
        .into_iter()
        .filter(|crd| {
            args.kind
                .as_deref()
                .is_none_or(|kind| crd.spec.names.kind.eq_ignore_ascii_case(kind))
        })
        .collect();

    if selected.is_empty() {
        eprintln!("No CRD matches kind {:?}", args.kind.unwrap_or_default());
        std::process::exit(1);
    }

    for crd in selected {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
