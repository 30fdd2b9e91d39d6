use cucumber::World;
use cucumber_tests::features::RollcallWorld;

#[tokio::main]
async fn main() {
    RollcallWorld::cucumber().run_and_exit("features/").await;
}
