use std::time::Duration;

use obdash_core::Sampler;

pub fn run(elm327: Option<&str>, count: usize, interval: Duration, query_timeout: Duration) {
    let link = super::make_link(elm327, query_timeout);
    let sampler = Sampler::new(link, query_timeout);

    let rt = super::runtime();
    rt.block_on(async {
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            let (snapshot, source) = sampler.sample().await;
            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Failed to encode snapshot: {e}");
                    std::process::exit(1);
                }
            }
            log::debug!("sample {} from {source}", i + 1);
        }
    });
}
