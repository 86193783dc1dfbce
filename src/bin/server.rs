//! animated-structures-server binary
//!
//! Loads structures into an in-memory world, toggles the requested ones and
//! logs every animation event as JSON until they finish (or Ctrl-C).
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                          | Default | Description                         |
//! |------------------------------|---------|-------------------------------------|
//! | `ANIM_TICK_RATE_HZ`          | `20`    | Animation steps per second          |
//! | `ANIM_MIN_STEPS`             | `5`     | Minimum steps per animation         |
//! | `ANIM_MAX_DURATION_SECS`     | `60`    | Longest allowed animation           |
//! | `ANIM_HOOK_UPDATE_INTERVAL`  | `5`     | Steps between progress events       |
//! | `ANIM_REGION_CHECK_INTERVAL` | `10`    | Steps between region checks         |
//! | `ANIM_MAX_BLOCK_COUNT`       | `1000`  | Block cap per structure             |

use anyhow::{Context, Result};
use animated_structures::{
    engine::{Collaborators, Engine},
    hooks::AnimationHook,
    memory::{InMemoryStore, InMemoryWorld, StaticPermissions},
    protocol::{AnimationEnded, AnimationPrepared, AnimationProgress, AnimationStarted, StructureEvent},
    structure::{BlockDescriptor, Structure, StructureSnapshot},
    ActorId, Cuboid, EngineConfig, StructureId, ToggleAction, ToggleCause,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "animated-structures-server", about = "Structure animation engine", version)]
struct Args {
    /// Optional TOML file with engine settings
    #[arg(long, env = "ANIM_CONFIG")]
    config: Option<String>,

    /// JSON file with the structures to load
    #[arg(long, env = "ANIM_STRUCTURES")]
    structures: String,

    /// Structure ids to toggle
    #[arg(long = "toggle", num_args = 1..)]
    toggles: Vec<u64>,

    /// Actor performing the toggles (server override when absent)
    #[arg(long, env = "ANIM_ACTOR")]
    actor: Option<String>,

    /// Duration override in seconds
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Jump straight to the end state
    #[arg(long, default_value_t = false)]
    skip_animation: bool,
}

#[derive(Debug, Deserialize)]
struct StructureEntry {
    #[serde(flatten)]
    structure: Structure,
    #[serde(default = "default_material")]
    material: String,
}

fn default_material() -> String {
    "stone".into()
}

// ---------------------------------------------------------------------------
// Event log hook
// ---------------------------------------------------------------------------

/// Writes every lifecycle event to the log as one JSON line.
struct JsonEventLog;

impl JsonEventLog {
    fn emit<T: Serialize>(&self, stage: &str, event: &StructureEvent<T>) -> Result<()> {
        let line = serde_json::to_string(event)?;
        log::info!("{} {}", stage, line);
        Ok(())
    }
}

impl AnimationHook for JsonEventLog {
    fn name(&self) -> &str {
        "json-event-log"
    }

    fn on_prepare(&self, _: &StructureSnapshot, event: &StructureEvent<AnimationPrepared>) -> Result<bool> {
        self.emit("prepare", event)?;
        Ok(true)
    }

    fn on_start(&self, _: &StructureSnapshot, event: &StructureEvent<AnimationStarted>) -> Result<()> {
        self.emit("start", event)
    }

    fn on_step(&self, _: &StructureSnapshot, event: &StructureEvent<AnimationProgress>) -> Result<()> {
        self.emit("step", event)
    }

    fn on_end(&self, _: &StructureSnapshot, event: &StructureEvent<AnimationEnded>) -> Result<()> {
        self.emit("end", event)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn load_engine_config(path: Option<&str>) -> Result<EngineConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix("ANIM").try_parsing(true))
        .build()
        .context("Failed to read engine configuration")?;
    settings
        .try_deserialize()
        .context("Invalid engine configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("animated_structures=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let engine_config = load_engine_config(args.config.as_deref())?;

    log::info!(
        "Starting animated-structures-server (structures='{}', tick_rate={}Hz, toggles={:?})",
        args.structures,
        engine_config.tick_rate_hz,
        args.toggles,
    );

    // Build world data layer
    let world = Arc::new(InMemoryWorld::new(16));
    let store = Arc::new(InMemoryStore::new());
    let permissions = Arc::new(StaticPermissions::new());

    let raw = std::fs::read_to_string(&args.structures)
        .with_context(|| format!("Failed to read {}", args.structures))?;
    let entries: Vec<StructureEntry> = serde_json::from_str(&raw).context("Invalid structures file")?;

    for entry in entries {
        let cuboid = entry.structure.cuboid;
        // Load a margin around each structure so rotated or moved blocks stay in loaded chunks
        let (dx, dy, dz) = cuboid.dimensions();
        let r = dx.max(dy).max(dz);
        world.load_region(&Cuboid::new(cuboid.min.offset(-r, -r, -r), cuboid.max.offset(r, r, r)));
        world.fill(&cuboid, BlockDescriptor::new(entry.material));
        store.insert(entry.structure);
    }
    log::info!("Loaded {} structure(s), {} block(s)", store.len(), world.block_count());

    let engine = Engine::new(
        engine_config,
        Collaborators {
            store,
            surface: world.clone(),
            gate: world,
            permissions,
        },
    );
    engine.register_hook(Arc::new(JsonEventLog));

    // Submit toggles
    let duration = args
        .duration_secs
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("--duration-secs must be a non-negative number of seconds")?;
    let actor = args.actor.map(ActorId::new);
    let mut handles = Vec::new();
    for id in args.toggles {
        let id = StructureId(id);
        let request = engine
            .request(id)
            .cause(if actor.is_some() {
                ToggleCause::Actor
            } else {
                ToggleCause::Server
            })
            .actor(actor.clone())
            .action(ToggleAction::Toggle)
            .duration(duration)
            .skip_animation(args.skip_animation)
            .build()
            .await;

        match request {
            Ok(request) => match engine.submit_toggle(request).await {
                Ok(handle) => handles.push(handle),
                Err(e) => log::warn!("Toggle of {} not started: {}", id, e),
            },
            Err(e) => log::warn!("Toggle of {} rejected: {}", id, e),
        }
    }

    // Run until all animations finish or shutdown
    let wait_all = async {
        for handle in handles {
            let id = handle.structure_id();
            match handle.wait().await {
                Ok(report) => log::info!(
                    "{} finished: {:?}, open={}, cuboid={}",
                    id,
                    report.reason,
                    report.structure.is_open,
                    report.structure.cuboid
                ),
                Err(e) => log::error!("{} failed: {}", id, e),
            }
        }
    };

    tokio::select! {
        _ = wait_all => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down (SIGINT)");
        }
    }

    engine.shutdown().await;
    log::info!("Stats: {}", serde_json::to_string(&engine.stats())?);
    Ok(())
}
