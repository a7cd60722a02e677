use pmu30lib::config::codec::BlobReader;

#[derive(clap::Args, Debug)]
pub struct InspectOpts {
    /// Blob file, bare or wrapped in a flash image.
    blob: String,
    /// Also hexdump each entry's config record.
    #[arg(long)]
    hex: bool,
}

impl crate::ToolRun for InspectOpts {
    fn run(&self) -> anyhow::Result<()> {
        let blob = crate::common::load_blob(&self.blob)?;
        let reader =
            BlobReader::new(&blob).map_err(|e| anyhow::anyhow!("bad blob: {}", e))?;

        let header = reader.header();
        println!("version      {}", header.version);
        println!("device type  {:#06x}", header.device_type);
        println!("total size   {}", header.total_size);
        println!("crc32        {:08x}", header.crc32);
        println!("channels     {}", header.channel_count);
        println!("flags        {:?}", header.flags);
        println!("timestamp    {}", header.timestamp);
        println!();

        for entry in reader {
            let entry = entry.map_err(|e| anyhow::anyhow!("bad entry: {}", e))?;
            println!(
                "  {:4}  {:<15} {:<20} {}",
                entry.header.id,
                crate::common::kind_name(entry.header.kind),
                entry.name.as_str().unwrap_or("<non-utf8>"),
                crate::common::config_summary(&entry.config),
            );

            if self.hex {
                let mut ser = pmu30lib::protocol::serialize::SerializerVec::new();
                if entry.config.serialize(&mut ser).is_ok() {
                    crate::hexdump::hexdump_prefix("        ", &ser.done());
                }
            }
        }

        Ok(())
    }
}
