//! `conclave simulate`: play a scenario through a live round table.
//!
//! Every participant is backed by a scripted provider. User messages are
//! posted one at a time; the next one goes out only after every agent has
//! drained its mailbox.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::Instrument;

use conclave_core::roundtable::RoundTableOrchestrator;
use conclave_core::tool::BoxToolRegistry;
use conclave_infra::config::load_engine_config;
use conclave_infra::repository::InMemoryRoundTableRepository;
use conclave_infra::scenario::load_scenario;
use conclave_observe::genai_attrs::{GEN_AI_OPERATION_NAME, OP_SIMULATE_ROUND_TABLE};
use conclave_types::event::RoundTableEvent;
use conclave_types::message::{Message, TurnMode};
use conclave_types::roundtable::Participant;

use super::timeline::{EventTally, describe_event, render_participants, render_timeline};

/// Command-line options of one simulation.
pub struct SimulateOptions<'a> {
    pub scenario: &'a Path,
    pub config: &'a Path,
    pub chunk_delay: Option<Duration>,
    pub turn_mode: Option<TurnMode>,
    pub live: bool,
    pub json: bool,
    pub quiet: bool,
}

/// Run a scenario and print its outcome.
pub async fn simulate(options: SimulateOptions<'_>) -> Result<()> {
    let config = load_engine_config(options.config).await;
    let scenario = load_scenario(options.scenario)
        .await
        .with_context(|| format!("loading scenario {}", options.scenario.display()))?;

    let span = tracing::info_span!(
        "conclave.simulate",
        { GEN_AI_OPERATION_NAME } = OP_SIMULATE_ROUND_TABLE,
        scenario = %scenario.name,
        participants = scenario.participants.len(),
    );

    async move {
        let round_table = scenario.build_round_table()?;
        let roster = round_table.roster().to_vec();
        let repository = Arc::new(InMemoryRoundTableRepository::new());
        repository.save_round_table(&round_table);

        let mut orchestrator = RoundTableOrchestrator::new(
            round_table.clone(),
            config,
            scenario.provider_registry(options.chunk_delay),
            repository.clone(),
        );
        if let Some(tools) = scenario.tool_registry() {
            orchestrator = orchestrator.with_tool_registry(BoxToolRegistry::new(tools));
        }
        orchestrator
            .set_turn_mode(options.turn_mode.unwrap_or(scenario.turn_mode))
            .await;

        let printer = tokio::spawn(follow_events(
            orchestrator.subscribe(),
            roster.clone(),
            options.live && !options.json && !options.quiet,
        ));

        if !options.json && !options.quiet {
            println!();
            println!(
                "  {} {} ({} participants, {} turn mode)",
                style("Round table").bold(),
                style(&round_table.name).cyan(),
                roster.len(),
                orchestrator.turn_mode().await,
            );
            println!();
        }

        for text in &scenario.messages {
            orchestrator.post_user_message(text.clone(), vec![]).await?;
            orchestrator.wait_idle().await;
        }

        let timeline = orchestrator.timeline().await;
        orchestrator.close().await;
        let tally = printer.await.context("event printer task failed")?;

        tracing::info!(
            messages = timeline.len(),
            persisted = repository.message_count(&round_table.id),
            "simulation finished"
        );

        if options.json {
            let output = serde_json::json!({
                "round_table": round_table,
                "messages": timeline,
                "stats": tally,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if !options.quiet {
            print_report(&timeline, &roster, &tally, options.live);
        }
        Ok::<_, anyhow::Error>(())
    }
    .instrument(span)
    .await
}

/// Tally events until the round table closes, printing them when `live`.
async fn follow_events(
    mut events: broadcast::Receiver<RoundTableEvent>,
    roster: Vec<Participant>,
    live: bool,
) -> EventTally {
    let mut tally = EventTally::default();
    loop {
        match events.recv().await {
            Ok(RoundTableEvent::RoundTableClosed { .. }) => break,
            Ok(event) => {
                tally.record(&event);
                if live {
                    if let Some(line) = describe_event(&event, &roster) {
                        println!("  {line}");
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tally
}

fn print_report(
    timeline: &[Message],
    roster: &[Participant],
    tally: &EventTally,
    live: bool,
) {
    if !live {
        println!("{}", render_timeline(timeline, roster));
        println!();
    }
    println!("{}", render_participants(roster, tally));
    println!();

    if tally.summaries > 0 {
        println!(
            "  {} context summarized {} time(s)",
            style("i").blue().bold(),
            tally.summaries
        );
    }
    if !tally.tools_bound.is_empty() {
        println!(
            "  {} tools used: {}",
            style("i").blue().bold(),
            tally.tools_bound.join(", ")
        );
    }
    if tally.persistence_failures > 0 {
        println!(
            "  {} {} write(s) were not persisted",
            style("!").red().bold(),
            tally.persistence_failures
        );
    }
}
