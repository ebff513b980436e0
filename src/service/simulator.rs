use crate::config::SimulatorConfig;
use crate::db::Storage;
use crate::db::locations::NewLocation;
use crate::error::TrackerError;
use crate::service::eta::GeoPoint;
use crate::service::gps_path::{PathWalker, build_path};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

/// Messages handled by the simulator actor.
#[derive(Debug)]
pub enum SimulatorMessage {
    /// Advance every simulated bus and store one sample each.
    Tick,
    Status(RpcReplyPort<SimulatorStatus>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulatorStatus {
    pub paused: bool,
    pub simulated_buses: usize,
    pub ticks: u64,
}

/// Handle for interacting with the simulator actor.
#[derive(Clone)]
pub struct SimulatorHandle {
    actor: ActorRef<SimulatorMessage>,
}

impl SimulatorHandle {
    pub fn tick(&self) {
        let _ = ractor::cast!(self.actor, SimulatorMessage::Tick);
    }

    /// Processed after every tick queued before it.
    pub async fn status(&self) -> Result<SimulatorStatus, TrackerError> {
        ractor::call!(self.actor, SimulatorMessage::Status)
            .map_err(|e| TrackerError::Actor(format!("Status RPC failed: {e}")))
    }

    /// Stop the actor and wait until it has deactivated its simulated rows.
    pub async fn stop(&self) -> Result<(), TrackerError> {
        self.actor
            .stop_and_wait(None, Some(Duration::from_secs(5)))
            .await
            .map_err(|e| TrackerError::Actor(format!("failed to stop GPS simulator: {e}")))
    }
}

struct SimulatorState {
    walkers: HashMap<i64, PathWalker>,
    rng: StdRng,
    started: Instant,
    last_tick: Instant,
    paused: bool,
    ticks: u64,
}

struct SimulatorActor {
    storage: Storage,
    config: SimulatorConfig,
}

#[ractor::async_trait]
impl Actor for SimulatorActor {
    type Msg = SimulatorMessage;
    type State = SimulatorState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _arguments: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            interval_secs = self.config.interval_secs,
            speed_kmh = self.config.speed_kmh,
            duration_secs = self.config.duration_secs,
            bus_ids = ?self.config.bus_ids,
            "GPS simulator starting"
        );
        let now = Instant::now();
        Ok(SimulatorState {
            walkers: HashMap::new(),
            rng: StdRng::from_entropy(),
            started: now,
            last_tick: now,
            paused: false,
            ticks: 0,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match self.storage.deactivate_simulated_locations().await {
            Ok(n) => info!(ticks = state.ticks, deactivated = n, "GPS simulator stopped"),
            Err(e) => warn!("Failed to deactivate simulated locations on stop: {}", e),
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SimulatorMessage::Tick => {
                if self.config.duration_secs > 0
                    && state.started.elapsed() >= Duration::from_secs(self.config.duration_secs)
                {
                    info!("GPS simulator reached its configured duration");
                    myself.stop(None);
                    return Ok(());
                }
                if let Err(e) = self.handle_tick(state).await {
                    warn!("Simulator tick failed: {}", e);
                }
            }
            SimulatorMessage::Status(rp) => {
                let _ = rp.send(SimulatorStatus {
                    paused: state.paused,
                    simulated_buses: state.walkers.len(),
                    ticks: state.ticks,
                });
            }
        }
        Ok(())
    }
}

impl SimulatorActor {
    async fn handle_tick(&self, state: &mut SimulatorState) -> Result<(), TrackerError> {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_tick).as_secs_f64();
        state.last_tick = now;
        state.ticks += 1;

        if self
            .storage
            .has_recent_real_location(self.config.real_driver_window_secs)
            .await?
        {
            let deactivated = self.storage.deactivate_simulated_locations().await?;
            if !state.paused {
                info!(deactivated, "real driver reporting, GPS simulator paused");
            }
            state.paused = true;
            return Ok(());
        }
        if state.paused {
            info!("no real driver reporting, GPS simulator resumed");
            state.paused = false;
        }

        let buses: Vec<_> = self
            .storage
            .list_buses(Some(true))
            .await?
            .into_iter()
            .filter(|b| self.config.bus_ids.is_empty() || self.config.bus_ids.contains(&b.id))
            .collect();
        state
            .walkers
            .retain(|id, _| buses.iter().any(|b| b.id == *id));

        let centre = GeoPoint::new(self.config.centre_lat, self.config.centre_lon);
        for bus in &buses {
            // a new walker reports its first waypoint before moving
            let step = if state.walkers.contains_key(&bus.id) {
                elapsed
            } else {
                let stop_count = match bus.current_route_id {
                    Some(route_id) => self.storage.list_stops(route_id).await?.len(),
                    None => 0,
                };
                debug!(bus = %bus.bus_number, stop_count, "simulating bus");
                state.walkers.insert(
                    bus.id,
                    PathWalker::new(build_path(centre, stop_count), self.config.speed_kmh),
                );
                0.0
            };
            self.record_sample(bus.id, state, step).await?;
        }
        Ok(())
    }

    async fn record_sample(
        &self,
        bus_id: i64,
        state: &mut SimulatorState,
        elapsed_secs: f64,
    ) -> Result<(), TrackerError> {
        let Some(walker) = state.walkers.get_mut(&bus_id) else {
            return Ok(());
        };
        walker.advance(elapsed_secs);
        let Some(sample) = walker.sample(&mut state.rng) else {
            return Ok(());
        };
        self.storage
            .insert_location(NewLocation {
                bus_id,
                driver_id: None,
                latitude: sample.point.lat,
                longitude: sample.point.lon,
                speed_kmh: Some(sample.speed_kmh),
                heading: Some(sample.heading),
                is_simulated: true,
            })
            .await?;
        Ok(())
    }
}

/// Spawn the simulator actor without a timer; ticks are driven by the caller.
pub async fn spawn_manual(
    storage: Storage,
    config: SimulatorConfig,
) -> Result<SimulatorHandle, TrackerError> {
    let (actor, _jh) = Actor::spawn(None, SimulatorActor { storage, config }, ())
        .await
        .map_err(|e| TrackerError::Actor(format!("failed to spawn GPS simulator: {e}")))?;
    Ok(SimulatorHandle { actor })
}

/// Spawn the simulator actor together with a ticker task casting `Tick`
/// every `interval_secs`. The ticker ends once the actor is gone.
pub async fn spawn(
    storage: Storage,
    config: SimulatorConfig,
) -> Result<SimulatorHandle, TrackerError> {
    let period = Duration::from_secs(config.interval_secs.max(1));
    let handle = spawn_manual(storage, config).await?;

    let actor = handle.actor.clone();
    tokio::spawn(async move {
        let mut ticks = IntervalStream::new(tokio::time::interval(period));
        while ticks.next().await.is_some() {
            if ractor::cast!(actor, SimulatorMessage::Tick).is_err() {
                debug!("GPS simulator gone, ticker exiting");
                break;
            }
        }
    });
    Ok(handle)
}
