//! # CSE Dispatcher Demo
//!
//! Starts a node and walks one application through the resource tree:
//! 1. Registering an `<AE>` and a `<container>` below it.
//! 2. Adding content instances and reading the newest through `la`.
//! 3. Discovering everything below the `<AE>`, then deleting it.
//!
//! Set `CSE_CONFIG` to a TOML file to override the defaults.

use cse_dispatch::config::DispatcherConfig;
use cse_dispatch::lifecycle::{setup_tracing, CseNode};
use cse_dispatch::model::{Request, ResourceType, ResultContent};
use serde_json::json;
use tracing::{info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::var("CSE_CONFIG") {
        Ok(path) => DispatcherConfig::from_file(&path).map_err(|e| e.to_string())?,
        Err(_) => DispatcherConfig::default(),
    };
    info!(?config, "Starting CSE");

    let node = CseNode::start(config).await.map_err(|e| e.to_string())?;
    let dispatcher = node.dispatcher.clone();

    let span = tracing::info_span!("registration");
    let ae = async {
        info!("Registering application");
        let request = Request::create(
            "cse-in",
            "C",
            ResourceType::Ae,
            json!({ "m2m:ae": { "rn": "lights", "api": "Nlights", "rr": true } }),
        );
        dispatcher.process_request(&request).await
    }
    .instrument(span)
    .await
    .map_err(|e| e.to_string())?;
    let originator = ae
        .resource()
        .and_then(|ae| ae.attribute("aei"))
        .and_then(|aei| aei.as_str().map(str::to_string))
        .ok_or("registration returned no originator")?;
    info!(%originator, "Application registered");

    let span = tracing::info_span!("measurements");
    async {
        let container = Request::create(
            "cse-in/lights",
            originator.as_str(),
            ResourceType::Container,
            json!({ "m2m:cnt": { "rn": "state", "mni": 2 } }),
        );
        dispatcher.process_request(&container).await?;
        for state in ["on", "off", "on"] {
            let instance = Request::create(
                "cse-in/lights/state",
                originator.as_str(),
                ResourceType::ContentInstance,
                json!({ "m2m:cin": { "con": state } }),
            );
            dispatcher.process_request(&instance).await?;
        }
        let latest = dispatcher
            .process_request(&Request::retrieve("cse-in/lights/state/la", originator.as_str()))
            .await?;
        info!(latest = ?latest.document(), "Latest state");
        Ok::<_, cse_dispatch::error::DispatchError>(())
    }
    .instrument(span)
    .await
    .map_err(|e| e.to_string())?;

    let discovery = Request::discover("cse-in/lights", originator.as_str());
    let found = dispatcher.process_request(&discovery).await.map_err(|e| e.to_string())?;
    info!(uris = ?found.document(), "Discovered");

    let delete = Request::delete("cse-in/lights", originator.as_str()).with_rcn(ResultContent::Attributes);
    let deleted = dispatcher.process_request(&delete).await.map_err(|e| e.to_string())?;
    info!(status = %deleted.status, "Application removed");

    drop(dispatcher);
    node.shutdown().await.map_err(|e| e.to_string())?;

    info!("Demo completed successfully");
    Ok(())
}
