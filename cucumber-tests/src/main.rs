use cucumber::{cli, World};
use cucumber_tests::features::RollcallWorld;

#[tokio::main]
async fn main() {
    RollcallWorld::cucumber()
        .with_cli::<()>(cli::Opts::parsed())
        .run_and_exit("features/")
        .await;
}
