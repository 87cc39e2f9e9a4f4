//! `hwatch station` -- run a station agent against a control service.
//!
//! Wires simulated sensors, the HTTP control client, the reliable event
//! publisher and (optionally) the SSE event follower into one
//! [`StationAgent`], then samples until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;

use hydrowatch_core::agent::{AgentOptions, StationAgent};
use hydrowatch_core::event::{PublishQueue, ReliablePublisher, RetryPolicy};
use hydrowatch_core::sensor::{Sensor, SimulatedSensor};
use hydrowatch_infra::http::{subscribe_events, HttpControlClient, HttpEventTransport};
use hydrowatch_types::config::AgentConfig;
use hydrowatch_types::station::StationId;

/// `<station>-0 .. <station>-(n-1)` simulated sensors.
pub fn simulated_sensors(station_id: &StationId, config: &AgentConfig) -> Vec<Arc<dyn Sensor>> {
    (0..config.sensor_count)
        .map(|i| {
            Arc::new(SimulatedSensor::new(
                station_id.sensor_id(i),
                config.anomaly_probability,
            )) as Arc<dyn Sensor>
        })
        .collect()
}

pub async fn run_station(
    station_id: StationId,
    config: AgentConfig,
    shutdown: impl std::future::Future<Output = ()>,
    json: bool,
) -> Result<()> {
    let control = HttpControlClient::new(&config.control_url, config.rpc_timeout())
        .context("invalid control service URL")?;
    let transport = HttpEventTransport::new(&config.control_url, config.rpc_timeout())
        .context("invalid control service URL")?;

    let cancel = CancellationToken::new();
    let publisher = ReliablePublisher::new(transport, RetryPolicy::from(&config.publish));
    let (queue, publish_task) = PublishQueue::spawn(publisher, cancel.clone());

    let sensors = simulated_sensors(&station_id, &config);
    let options = AgentOptions {
        rpc_timeout: config.rpc_timeout(),
        ..AgentOptions::default()
    };
    let neighbors = config.neighbors.iter().map(|n| StationId::from(n.as_str()));
    let agent = Arc::new(
        StationAgent::new(station_id.clone(), control, sensors, options)
            .with_neighbors(neighbors)
            .with_publisher(queue),
    );

    if !json {
        println!();
        println!(
            "  {} Station {} -> {} ({} sensor(s), every {}s)",
            style("~").cyan().bold(),
            style(&station_id).cyan(),
            style(&config.control_url).dim(),
            config.sensor_count,
            config.sample_interval_secs,
        );
        println!();
    }

    let follower = if config.follow_events {
        let events = subscribe_events(&config.control_url, cancel.clone())
            .context("invalid control service URL")?;
        Some(tokio::spawn(
            Arc::clone(&agent).follow_events(events, cancel.clone()),
        ))
    } else {
        None
    };

    let runner = tokio::spawn(Arc::clone(&agent).run(config.sample_interval(), cancel.clone()));

    shutdown.await;
    cancel.cancel();

    runner.await.context("agent loop panicked")?;
    if let Some(follower) = follower {
        follower.await.context("event follower panicked")?;
    }
    let stats = publish_task.await.context("publish loop panicked")?;

    if json {
        let summary = serde_json::json!({
            "station_id": station_id,
            "state": agent.state().await.to_string(),
            "events_delivered": stats.delivered,
            "events_dropped": stats.dropped,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "  {} Station {} stopped ({} event(s) delivered, {} dropped)",
            style("✓").green().bold(),
            style(&station_id).cyan(),
            stats.delivered,
            stats.dropped,
        );
    }
    Ok(())
}
