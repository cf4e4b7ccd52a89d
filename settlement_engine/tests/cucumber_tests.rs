mod cucumber;

use ::cucumber::{event::ScenarioFinished, writer, World};
use futures_util::FutureExt;
use log::*;

use crate::cucumber::SettlementWorld;

const FEATURES: &str = "tests/features";

#[tokio::main]
async fn main() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    SettlementWorld::cucumber()
        .with_writer(writer::Libtest::or_basic())
        .after(|_feature, _rule, scenario, finished, world| {
            let passed = matches!(finished, ScenarioFinished::StepPassed);
            let name = scenario.name.clone();
            async move {
                match world.and_then(|w| w.system.as_mut()) {
                    Some(sys) if passed => sys.tear_down().await,
                    Some(sys) => warn!("Scenario \"{name}\" did not pass. Keeping {}", sys.db_path),
                    None => trace!("Scenario \"{name}\" never built a settlement system"),
                }
            }
            .boxed_local()
        })
        .run(FEATURES)
        .await;
    info!("Settlement scenarios complete");
}
