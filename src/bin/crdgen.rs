//! # CRD Generator
//!
//! Generates the PodAutoscaler CustomResourceDefinition YAML from the Rust types.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/podautoscaler.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::CustomResourceExt;
use podautoscaler_controller::crd::PodAutoscaler;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&PodAutoscaler::crd())?);
    Ok(())
}
