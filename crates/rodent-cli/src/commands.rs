use std::sync::Arc;

use anyhow::{Context, Result};
use rodent_domain::{DeviceId, DiskFilter, ProbeId, ScheduleId};
use rodent_events::NullSink;
use rodent_manager::Manager;
use rodent_probe::NoPools;
use uuid::Uuid;

use crate::cli::{Cli, Command, ConfigCommand, ProbeCommand, ScheduleCommand};
use crate::output;

async fn build_manager(cli: &Cli) -> Result<Arc<Manager>> {
    let manager = Manager::new(
        cli.config_path.clone(),
        cli.state_path.clone(),
        Arc::new(NullSink),
        Arc::new(NoPools),
    )
    .await
    .context("failed to initialize manager")?;
    Ok(Arc::new(manager))
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Start => start(&cli).await,
        Command::Inventory { state, available_only } => inventory(&cli, *state, *available_only).await,
        Command::Show { device_id } => show(&cli, device_id).await,
        Command::Discover => discover(&cli).await,
        Command::HealthCheck => health_check(&cli).await,
        Command::Validate { device_id } => validate(&cli, device_id).await,
        Command::Probe(probe_command) => probe(&cli, probe_command).await,
        Command::Schedule(schedule_command) => schedule(&cli, schedule_command).await,
        Command::SetState { device_id, state, reason } => set_state(&cli, device_id, *state, reason).await,
        Command::Quarantine { device_id, reason } => quarantine(&cli, device_id, reason).await,
        Command::Tag { device_id, key, value } => tag(&cli, device_id, key, value).await,
        Command::Topology => topology(&cli).await,
        Command::Stats => stats(&cli).await,
        Command::Config(config_command) => config(&cli, config_command).await,
    }
}

async fn start(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager.start().await.context("failed to start manager")?;
    tracing::info!("rodent manager running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    manager.stop().await.context("failed to stop manager cleanly")?;
    Ok(())
}

async fn inventory(cli: &Cli, state: Option<crate::cli::StateArg>, available_only: bool) -> Result<()> {
    let manager = build_manager(cli).await?;
    let filter = DiskFilter {
        states: state.map(|s| vec![s.into()]).unwrap_or_default(),
        available_only: available_only.then_some(true),
        ..Default::default()
    };
    let filter = if filter.is_empty() { None } else { Some(&filter) };
    let disks = manager.get_inventory(filter).await;
    println!("{}", output::render_inventory(&disks));
    Ok(())
}

async fn show(cli: &Cli, device_id: &str) -> Result<()> {
    let manager = build_manager(cli).await?;
    let id = DeviceId::new(device_id);
    let disk = manager.get_disk(&id).await.with_context(|| format!("no such disk: {device_id}"))?;
    let preferred_path = manager
        .preferred_path(&id)
        .await
        .with_context(|| format!("failed to resolve preferred path for {device_id}"))?;
    println!("{}", output::render_disk(&disk, &preferred_path));
    Ok(())
}

async fn discover(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager.trigger_discovery().await.context("discovery failed")?;
    println!("discovery complete");
    Ok(())
}

async fn health_check(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager.trigger_health_check().await.context("health check failed")?;
    println!("health check complete");
    Ok(())
}

async fn validate(cli: &Cli, device_id: &str) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager
        .validate_disk(&DeviceId::new(device_id))
        .await
        .with_context(|| format!("failed to validate {device_id}"))?;
    println!("{device_id} validated");
    Ok(())
}

async fn probe(cli: &Cli, command: &ProbeCommand) -> Result<()> {
    let manager = build_manager(cli).await?;
    match command {
        ProbeCommand::Trigger { device_id, probe_type } => {
            let execution = manager
                .trigger_probe(DeviceId::new(device_id), (*probe_type).into(), "cli".to_string())
                .await
                .context("failed to trigger probe")?;
            println!("{}", output::render_probe_execution(&execution));
        }
        ProbeCommand::Cancel { probe_id } => {
            let id = parse_probe_id(probe_id)?;
            manager.cancel_probe(&id).await.context("failed to cancel probe")?;
            println!("probe {probe_id} cancelled");
        }
        ProbeCommand::Show { probe_id } => {
            let id = parse_probe_id(probe_id)?;
            let execution = manager
                .get_probe_execution(&id)
                .await
                .with_context(|| format!("no such probe: {probe_id}"))?;
            println!("{}", output::render_probe_execution(&execution));
        }
        ProbeCommand::Active => {
            let executions = manager.get_active_probes().await.context("failed to list active probes")?;
            println!("{}", output::render_probe_list(&executions));
        }
        ProbeCommand::History { device_id, limit } => {
            let executions = manager
                .get_probe_history(&DeviceId::new(device_id), *limit)
                .await
                .context("failed to fetch probe history")?;
            println!("{}", output::render_probe_list(&executions));
        }
    }
    Ok(())
}

async fn schedule(cli: &Cli, command: &ScheduleCommand) -> Result<()> {
    let manager = build_manager(cli).await?;
    match command {
        ScheduleCommand::List => {
            let schedules = manager.list_probe_schedules().await.context("failed to list schedules")?;
            println!("{}", output::render_schedules(&schedules));
        }
        ScheduleCommand::Enable { schedule_id } => {
            manager
                .enable_probe_schedule(&ScheduleId::new(schedule_id.clone()))
                .await
                .with_context(|| format!("failed to enable schedule {schedule_id}"))?;
            println!("schedule {schedule_id} enabled");
        }
        ScheduleCommand::Disable { schedule_id } => {
            manager
                .disable_probe_schedule(&ScheduleId::new(schedule_id.clone()))
                .await
                .with_context(|| format!("failed to disable schedule {schedule_id}"))?;
            println!("schedule {schedule_id} disabled");
        }
        ScheduleCommand::Delete { schedule_id } => {
            manager
                .delete_probe_schedule(&ScheduleId::new(schedule_id.clone()))
                .await
                .with_context(|| format!("failed to delete schedule {schedule_id}"))?;
            println!("schedule {schedule_id} deleted");
        }
    }
    Ok(())
}

async fn set_state(cli: &Cli, device_id: &str, state: crate::cli::StateArg, reason: &str) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager
        .set_disk_state(&DeviceId::new(device_id), state.into(), reason.to_string())
        .await
        .with_context(|| format!("failed to transition {device_id}"))?;
    println!("{device_id} transitioned");
    Ok(())
}

async fn quarantine(cli: &Cli, device_id: &str, reason: &str) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager
        .quarantine_disk(&DeviceId::new(device_id), reason.to_string())
        .await
        .with_context(|| format!("failed to quarantine {device_id}"))?;
    println!("{device_id} quarantined");
    Ok(())
}

async fn tag(cli: &Cli, device_id: &str, key: &str, value: &str) -> Result<()> {
    let manager = build_manager(cli).await?;
    manager
        .set_tag(&DeviceId::new(device_id), key.to_string(), value.to_string())
        .await
        .with_context(|| format!("failed to tag {device_id}"))?;
    println!("{device_id} tagged {key}={value}");
    Ok(())
}

async fn topology(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli).await?;
    let snapshot = manager.get_topology().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("failed to render topology")?
    );
    Ok(())
}

async fn stats(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli).await?;
    let statistics = manager.statistics().await.context("failed to compute statistics")?;
    println!("{}", output::render_statistics(&statistics));
    Ok(())
}

async fn config(cli: &Cli, command: &ConfigCommand) -> Result<()> {
    let manager = build_manager(cli).await?;
    match command {
        ConfigCommand::Show => {
            let config = manager.get_config().await;
            println!("{}", serde_json::to_string_pretty(&*config).context("failed to render config")?);
        }
        ConfigCommand::Reload => {
            let config = manager.reload_config().await.context("failed to reload config")?;
            println!("{}", serde_json::to_string_pretty(&*config).context("failed to render config")?);
        }
    }
    Ok(())
}

fn parse_probe_id(raw: &str) -> Result<ProbeId> {
    let uuid = Uuid::parse_str(raw).with_context(|| format!("invalid probe id: {raw}"))?;
    Ok(ProbeId(uuid))
}
