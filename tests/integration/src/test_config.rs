// Licensed under the Apache-2.0 license

//! Host configuration files driving the provisioning stack.

#[cfg(test)]
mod test {
    use crate::test::{emulated_board, init_logging};
    use fb_config::{AccessClass, BootBusWidth, StaticRegionTable};
    use fb_hw_model::{Area, MemoryPartitionTable};
    use fb_host_config::ProvisionConfig;
    use fb_mmc::ext_csd::{EXT_CSD_BOOT_BUS_WIDTH, EXT_CSD_PART_CONFIG};
    use fb_mmc::{AliasMap, BootAccessController, PartitionResolver, ProvisionError, Provisioner};
    use fb_sparse::AndroidSparseDecoder;

    const BOARD_TOML: &str = r#"
block_size = 512

[aliases]
rootfs = "system"
data = "userdata"

[[static_regions]]
name = "bootloader"
start_block = 0
block_count = 0x500
class = "protected"

[[static_regions]]
name = "env"
start_block = 0x1
block_count = 0x20

[[static_regions]]
name = "kernel"
start_block = 0x200
block_count = 0x2000

[boot_access]
boot_partition = 2
boot_ack = false
open_bus_width = 8
close_bus_width = 1
settle_delay_us = 10
status_poll_limit = 20
status_poll_interval_us = 10
"#;

    fn load(dir: &tempfile::TempDir) -> ProvisionConfig {
        let path = dir.path().join("board.toml");
        std::fs::write(&path, BOARD_TOML).unwrap();
        ProvisionConfig::from_file(&path).unwrap()
    }

    #[test]
    fn test_config_builds_static_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);

        let regions = config.region_list();
        let table = StaticRegionTable::new(&regions, config.block_size).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.protected().map(|r| r.name), Some("bootloader"));
        assert_eq!(
            table.find("kernel").map(|r| (r.start_block, r.block_count)),
            Some((0x200, 0x2000))
        );
        assert_eq!(
            table.find("env").map(|r| r.access_class),
            Some(AccessClass::Normal)
        );

        let boot = config.boot_access_config().unwrap();
        assert_eq!(boot.open_bus_width, BootBusWidth::X8);
        assert!(!boot.boot_ack);
    }

    #[test]
    fn test_configured_provisioning() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);

        let regions = config.region_list();
        let table = StaticRegionTable::new(&regions, config.block_size).unwrap();
        let gpt = MemoryPartitionTable::new(512).with_partition("system", 0x2400, 0x400);
        let aliases: &dyn AliasMap = &config.aliases;
        let resolver = PartitionResolver::new()
            .with_dynamic_table(&gpt)
            .with_aliases(aliases)
            .with_static_regions(table);
        let boot_access = BootAccessController::new(config.boot_access_config().unwrap());

        let mut mmc = emulated_board();
        let mut prov = Provisioner::new(&mut mmc, resolver, boot_access, AndroidSparseDecoder::new());

        // Alias resolved through the dynamic table.
        let report = prov.flash("rootfs", &[0x5a; 1024]);
        assert_eq!(report.response().message(), "wrote 1024 bytes to 'rootfs'");
        assert_eq!(report.target.unwrap().start_block, 0x2400);

        // Alias whose target is not in the table.
        assert_eq!(prov.erase("data").result.unwrap_err(), ProvisionError::NotFound);

        // Protected region goes to the configured boot partition.
        assert!(prov.flash("bootloader", &[0xa5; 512]).is_ok());
        drop(prov);

        assert!(mmc.area(Area::User)[0x2400 * 512..0x2400 * 512 + 1024]
            .iter()
            .all(|&b| b == 0x5a));
        assert!(mmc.area(Area::Boot2)[..512].iter().all(|&b| b == 0xa5));
        assert!(mmc.area(Area::Boot1)[..512].iter().all(|&b| b == 0));

        // Closed with the configured 1-bit bus, user area selected, no ack.
        assert_eq!(mmc.partition_access(), Some(Area::User));
        assert_eq!(mmc.ext_csd()[EXT_CSD_PART_CONFIG as usize] & 0x40, 0);
        assert_eq!(mmc.ext_csd()[EXT_CSD_BOOT_BUS_WIDTH as usize] & 0x3, 0);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir);
        let copy = dir.path().join("copy.toml");
        config.save_to_file(&copy).unwrap();

        let reloaded = ProvisionConfig::from_file(&copy).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.aliases.lookup("data"), Some("userdata"));
    }
}
