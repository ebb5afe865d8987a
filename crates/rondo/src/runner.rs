//! Polling scheduler around a set of simulated controllers.
//!
//! The runner owns the name → controller registry, resolves scenario
//! events to controller indices when the scenario is loaded (never on the
//! poll path), and then re-enters every controller on the configured
//! cadence: dispatch due commands, poll, publish samples.

use crate::config::Config;
use crate::scenario::{Command, Scenario};
use crate::telemetry::{AxisSample, SampleSink};
use anyhow::{Context, Result, bail};
use rondo_core::{AxisConfig, SimController};
use std::collections::HashMap;
use std::time::Duration;

pub struct Runner {
    controllers: Vec<(String, SimController)>,
    names: HashMap<String, usize>,
    poll_period: f64,
    max_time: f64,
}

/// Outcome of a completed (or capped) run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub simulated_time: f64,
    pub dispatched: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
struct ResolvedEvent {
    at: f64,
    controller: usize,
    axis: usize,
    command: Command,
}

struct RunState {
    events: Vec<ResolvedEvent>,
    next: usize,
    time: f64,
    rejected: usize,
}

impl Runner {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut controllers = Vec::new();
        let mut names = HashMap::new();
        for controller_config in &config.controllers {
            let mut controller = SimController::new();
            for axis in &controller_config.axes {
                let index = controller.add_axis(axis.axis_config())?;
                controller.axis_mut(index)?.set_limits(axis.motion_limits());
            }
            names.insert(controller_config.name.clone(), controllers.len());
            controllers.push((controller_config.name.clone(), controller));
        }
        Ok(Self {
            controllers,
            names,
            poll_period: config.sim.poll_period,
            max_time: config.sim.max_time,
        })
    }

    /// Registry lookup; intended for fixtures and assertions, not the
    /// poll path.
    pub fn controller(&self, name: &str) -> Option<&SimController> {
        self.names.get(name).map(|&index| &self.controllers[index].1)
    }

    /// Resolve controller names and axis indices without running
    /// anything. Returns the number of events that would be dispatched.
    pub fn validate_scenario(&self, scenario: &Scenario) -> Result<usize> {
        Ok(self.resolve(scenario)?.len())
    }

    /// Drive the simulation as fast as possible.
    pub fn run(&mut self, scenario: &Scenario, sink: &mut dyn SampleSink) -> Result<RunSummary> {
        let mut state = self.prepare(scenario)?;
        while self.step(&mut state, sink) {}
        Ok(self.summarize(&state))
    }

    /// Drive the simulation paced against the wall clock, one poll per
    /// period.
    pub async fn run_paced(
        &mut self,
        scenario: &Scenario,
        sink: &mut dyn SampleSink,
    ) -> Result<RunSummary> {
        let mut state = self.prepare(scenario)?;
        let mut interval = tokio::time::interval(Duration::from_secs_f64(self.poll_period));
        loop {
            interval.tick().await;
            if !self.step(&mut state, sink) {
                break;
            }
        }
        Ok(self.summarize(&state))
    }

    fn prepare(&self, scenario: &Scenario) -> Result<RunState> {
        let mut events = self.resolve(scenario)?;
        // Stable sort: simultaneous events keep their file order.
        events.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(RunState {
            events,
            next: 0,
            time: 0.0,
            rejected: 0,
        })
    }

    fn resolve(&self, scenario: &Scenario) -> Result<Vec<ResolvedEvent>> {
        let mut events = Vec::with_capacity(scenario.events.len());
        for event in &scenario.events {
            if !(event.at >= 0.0) {
                bail!("event time {} is not a non-negative number", event.at);
            }
            let controller = match &event.controller {
                Some(name) => *self
                    .names
                    .get(name)
                    .with_context(|| format!("unknown controller {name:?}"))?,
                None => 0,
            };
            if !matches!(event.command, Command::DeferMoves { .. }) {
                let (name, aggregate) = &self.controllers[controller];
                if event.axis >= aggregate.axis_count() {
                    bail!(
                        "axis {} is not configured on controller {:?} ({} axes)",
                        event.axis,
                        name,
                        aggregate.axis_count()
                    );
                }
            }
            events.push(ResolvedEvent {
                at: event.at,
                controller,
                axis: event.axis,
                command: event.command.clone(),
            });
        }
        Ok(events)
    }

    /// One scheduler tick: dispatch due commands, advance every
    /// controller by one poll period, publish samples. Returns false
    /// once the scenario is exhausted and all axes are idle, or the
    /// simulated-time cap is hit.
    fn step(&mut self, state: &mut RunState, sink: &mut dyn SampleSink) -> bool {
        while state.next < state.events.len() && state.events[state.next].at <= state.time {
            let index = state.next;
            state.next += 1;
            if let Err(error) = self.dispatch(&state.events[index]) {
                state.rejected += 1;
                // A rejected command leaves the axis untouched; the run
                // goes on.
                tracing::warn!(time = state.time, %error, "command rejected");
            }
        }

        state.time += self.poll_period;
        let mut moving = false;
        for (name, controller) in &mut self.controllers {
            moving |= controller.poll(self.poll_period);
            for index in 0..controller.axis_count() {
                let Ok(axis) = controller.axis(index) else {
                    continue;
                };
                sink.publish(&AxisSample {
                    time: state.time,
                    controller: name.clone(),
                    axis: index,
                    position: axis.reported_position(),
                    encoder: axis.encoder_position(),
                    velocity: axis.velocity(),
                    flags: axis.flags(),
                });
            }
        }

        if state.next >= state.events.len() && !moving {
            return false;
        }
        if state.time >= self.max_time {
            tracing::warn!(
                time = state.time,
                pending_events = state.events.len() - state.next,
                "simulated-time cap reached before the scenario settled"
            );
            return false;
        }
        true
    }

    fn dispatch(&mut self, event: &ResolvedEvent) -> Result<()> {
        let (_, controller) = &mut self.controllers[event.controller];
        match &event.command {
            Command::DeferMoves { enable } => controller.defer_moves(*enable),
            Command::Move {
                target,
                relative,
                min_velocity,
                max_velocity,
                acceleration,
            } => {
                controller.axis_mut(event.axis)?.move_to(
                    *target,
                    *relative,
                    *min_velocity,
                    *max_velocity,
                    *acceleration,
                )?;
            }
            Command::SetVelocity {
                velocity,
                acceleration,
            } => {
                controller
                    .axis_mut(event.axis)?
                    .set_velocity(*velocity, *acceleration)?;
            }
            Command::Home {
                min_velocity,
                max_velocity,
                acceleration,
                forwards,
            } => {
                controller.axis_mut(event.axis)?.home(
                    *min_velocity,
                    *max_velocity,
                    *acceleration,
                    *forwards,
                )?;
            }
            Command::Stop { acceleration } => {
                controller.axis_mut(event.axis)?.stop(*acceleration);
            }
            Command::SetPosition { position } => {
                controller.axis_mut(event.axis)?.set_position(*position);
            }
            Command::Config {
                high_limit,
                low_limit,
                home,
                start,
            } => {
                controller.axis_mut(event.axis)?.reconfigure(AxisConfig {
                    low_limit: *low_limit,
                    high_limit: *high_limit,
                    home: *home,
                    start: *start,
                })?;
            }
        }
        Ok(())
    }

    fn summarize(&self, state: &RunState) -> RunSummary {
        RunSummary {
            simulated_time: state.time,
            dispatched: state.next,
            rejected: state.rejected,
        }
    }
}
