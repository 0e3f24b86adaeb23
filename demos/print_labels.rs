use std::env;
use vbf_vmj_rs::{Loader, Source};

#[tokio::main(flavor = "current_thread")]
async fn main() -> vbf_vmj_rs::Result<()> {
    env_logger::init();
    let path = env::args().nth(1).expect("VBF or VMJ file required");

    let loader = Loader::new();
    let Some(model) = loader.load(Source::from_path(&path)).await? else {
        return Ok(());
    };
    for (label, value) in model.data_labels() {
        println!("{label}: {value}");
    }
    for [x, y, z] in model.vertices.points().take(5) {
        println!("Point coordinates: ({x}, {y}, {z})");
    }

    Ok(())
}
