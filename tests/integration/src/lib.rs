// Licensed under the Apache-2.0 license

mod test_config;
mod test_properties;
mod test_provisioning;

#[cfg(test)]
mod test {
    use fb_config::StaticRegionTable;
    use fb_hw_model::EmulatedMmc;
    use fb_mmc::{BootAccessController, PartitionResolver, Provisioner};
    use fb_sparse::AndroidSparseDecoder;
    use log::LevelFilter;
    use simple_logger::SimpleLogger;

    /// User area of the emulated board, in blocks.
    pub const USER_BLOCKS: u64 = 0x4000;

    /// Size of each boot partition of the emulated board, in blocks.
    pub const BOOT_BLOCKS: u64 = 0x800;

    pub fn init_logging() {
        let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    }

    pub fn board_regions() -> StaticRegionTable<'static> {
        fb_config_itop4412::flash::static_region_table().unwrap()
    }

    pub fn board_resolver() -> PartitionResolver<'static> {
        PartitionResolver::new().with_static_regions(board_regions())
    }

    pub fn emulated_board() -> EmulatedMmc {
        EmulatedMmc::new(USER_BLOCKS, BOOT_BLOCKS).with_erase_group(16)
    }

    pub fn board_provisioner(mmc: &mut EmulatedMmc) -> Provisioner<'_, EmulatedMmc, AndroidSparseDecoder> {
        Provisioner::new(
            mmc,
            board_resolver(),
            BootAccessController::default(),
            AndroidSparseDecoder::new(),
        )
    }
}
