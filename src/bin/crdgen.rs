//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions of every connector kind as a
//! multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use cloud_connectors::crd::{YandexContainerRegistry, YandexMessageQueue, YandexObjectStorage};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        YandexContainerRegistry::crd(),
        YandexMessageQueue::crd(),
        YandexObjectStorage::crd(),
    ];
    let documents = crds
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    print!("{}", documents.join("---\n"));
    Ok(())
}
