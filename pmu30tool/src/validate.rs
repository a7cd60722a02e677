use pmu30lib::config::codec::BlobReader;
use pmu30lib::config::validate::{validate, Limits};

#[derive(clap::Args, Debug)]
pub struct ValidateOpts {
    /// Blob file, bare or wrapped in a flash image.
    blob: String,
}

impl crate::ToolRun for ValidateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let blob = crate::common::load_blob(&self.blob)?;
        let reader =
            BlobReader::new(&blob).map_err(|e| anyhow::anyhow!("bad blob: {}", e))?;

        let limits = Limits::default();
        let mut checked = 0usize;
        let mut failed = 0usize;

        for entry in reader {
            let entry = entry.map_err(|e| anyhow::anyhow!("bad entry: {}", e))?;
            checked += 1;

            match validate(&entry.header, &entry.config, &entry.name, &limits) {
                Ok(()) => {}
                Err(e) => {
                    failed += 1;
                    println!(
                        "channel {} ({}): {}",
                        entry.header.id,
                        entry.name.as_str().unwrap_or("<non-utf8>"),
                        e
                    );
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} of {} channels failed validation", failed, checked);
        }
        println!("{} channels ok", checked);
        Ok(())
    }
}
