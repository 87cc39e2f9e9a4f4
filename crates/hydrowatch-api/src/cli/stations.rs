//! One-shot station commands: list, show, neighbors.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use hydrowatch_core::control::ControlPlane;
use hydrowatch_infra::http::HttpControlClient;
use hydrowatch_types::station::{StationId, StationStatus};

fn status_cell(status: StationStatus) -> Cell {
    match status {
        StationStatus::Normal => Cell::new("● normal").fg(Color::Green),
        StationStatus::Warning => Cell::new("● warning").fg(Color::Yellow),
        StationStatus::Critical => Cell::new("● critical").fg(Color::Red),
    }
}

fn join_ids(ids: &[StationId]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter().map(StationId::as_str).collect::<Vec<_>>().join(", ")
    }
}

/// `hwatch stations`
pub async fn list_stations(client: &HttpControlClient, json: bool) -> Result<()> {
    let stations = client.list_stations().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stations)?);
        return Ok(());
    }

    if stations.is_empty() {
        println!();
        println!(
            "  {} No stations registered. Start one with: {}",
            style("i").blue().bold(),
            style("hwatch station <id>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Station").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("pH").fg(Color::White),
        Cell::new("Turbidity").fg(Color::White),
        Cell::new("Pollutants").fg(Color::White),
        Cell::new("Neighbors").fg(Color::White),
    ]);

    for station in &stations {
        table.add_row(vec![
            Cell::new(&station.station_id),
            status_cell(station.status),
            Cell::new(format!("{:.1}", station.ph)),
            Cell::new(format!("{:.1}", station.turbidity)),
            Cell::new(format!("{:.1}", station.pollutants)),
            Cell::new(join_ids(&station.neighbors)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} station(s) from {}",
        stations.len(),
        style(client.base_url()).dim()
    );
    println!();
    Ok(())
}

/// `hwatch show <id>`
pub async fn show_station(client: &HttpControlClient, id: &str, json: bool) -> Result<()> {
    let station_id = StationId::from(id);
    let data = client.quality_data(&station_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let status = match data.status {
        StationStatus::Normal => style(data.status.to_string()).green(),
        StationStatus::Warning => style(data.status.to_string()).yellow(),
        StationStatus::Critical => style(data.status.to_string()).red(),
    };

    println!();
    println!("  {} {}", style("Station").bold(), style(&data.station_id).cyan().bold());
    println!();
    println!("  {:<12} {}", style("Status").dim(), status);
    println!("  {:<12} {:.2}", style("pH").dim(), data.ph);
    println!("  {:<12} {:.2}", style("Turbidity").dim(), data.turbidity);
    println!("  {:<12} {:.2}", style("Pollutants").dim(), data.pollutants);
    println!();
    Ok(())
}

/// `hwatch neighbors list <id>`
pub async fn list_neighbors(client: &HttpControlClient, id: &str, json: bool) -> Result<()> {
    let station_id = StationId::from(id);
    let neighbors = client.neighbors(&station_id).await?;

    if json {
        let body = serde_json::json!({ "station_id": station_id, "neighbors": neighbors });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} neighbors: {}",
        style(&station_id).cyan().bold(),
        join_ids(&neighbors)
    );
    println!();
    Ok(())
}

/// `hwatch neighbors add <id> <neighbor>`
pub async fn add_neighbor(
    client: &HttpControlClient,
    id: &str,
    neighbor: &str,
    json: bool,
) -> Result<()> {
    let status = client
        .add_neighbor(&StationId::from(id), &StationId::from(neighbor))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!();
        println!("  {} {}", style("✓").green().bold(), status.message);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_lists_render_compactly() {
        assert_eq!(join_ids(&[]), "-");
        assert_eq!(
            join_ids(&[StationId::from("S2"), StationId::from("S3")]),
            "S2, S3"
        );
    }
}
