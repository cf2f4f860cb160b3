// Licensed under the Apache-2.0 license

//! Laws that hold for every region, size and erase geometry.

#[cfg(test)]
mod test {
    use crate::test::{board_provisioner, board_resolver, emulated_board, init_logging};
    use fb_config::AccessClass;
    use fb_config_itop4412::flash::STATIC_REGIONS;
    use fb_hw_model::{Area, EmulatedMmc, MemoryPartitionTable, Transaction};
    use fb_mmc::{
        BootAccessController, PartitionResolver, ProvisionError, Provisioner, ResolveError,
        WriteError,
    };
    use fb_sparse::AndroidSparseDecoder;

    const BLOCK: u64 = 512;

    #[test]
    fn test_static_regions_resolve_exactly() {
        let resolver = board_resolver();
        for region in STATIC_REGIONS {
            let desc = resolver.resolve(region.name).unwrap();
            assert_eq!(desc.name.as_str(), region.name);
            assert_eq!(desc.start_block, region.start_block);
            assert_eq!(desc.block_count, region.block_count);
            assert_eq!(desc.block_size, BLOCK as u32);
            assert_eq!(desc.is_protected(), region.name == "bootloader");
            assert_eq!(
                desc.access_class == AccessClass::Protected,
                region.access_class == AccessClass::Protected
            );
        }

        let long = "x".repeat(37);
        for name in ["", "Env", "boot", "kernel ", long.as_str()] {
            assert_eq!(resolver.resolve(name), Err(ResolveError::NotFound));
        }
    }

    #[test]
    fn test_raw_capacity_law() {
        init_logging();
        for region in STATIC_REGIONS {
            let capacity = region.block_count * BLOCK;
            for len in [0, 1, BLOCK - 1, BLOCK, BLOCK + 1, capacity - 1, capacity, capacity + 1] {
                let mut mmc = emulated_board();
                let payload = vec![0xa5u8; len as usize];
                let report = board_provisioner(&mut mmc).flash(region.name, &payload);

                let blocks = len.div_ceil(BLOCK);
                let wrote = mmc
                    .trace()
                    .iter()
                    .any(|t| matches!(t, Transaction::Write { .. }));
                if blocks <= region.block_count {
                    let outcome = report.into_result().unwrap();
                    assert_eq!(outcome.bytes_written, len);
                    assert_eq!(outcome.blocks_written, blocks);
                    assert_eq!(wrote, blocks > 0);
                } else {
                    assert_eq!(
                        report.result.unwrap_err(),
                        ProvisionError::Write(WriteError::TooLarge {
                            required: blocks,
                            capacity: region.block_count,
                        })
                    );
                    assert!(!wrote, "'{}' touched the device", region.name);
                }
            }
        }
    }

    #[test]
    fn test_erase_alignment_law() {
        const STARTS: [u64; 8] = [0, 1, 7, 15, 16, 17, 100, 1000];
        const COUNTS: [u64; 10] = [0, 1, 10, 15, 16, 17, 31, 32, 100, 513];
        const GROUPS: [u64; 6] = [1, 2, 8, 16, 100, 512];

        for group in GROUPS {
            let mut mmc = EmulatedMmc::new(0x1000, 8).with_erase_group(group);
            for start in STARTS {
                for count in COUNTS {
                    let table = MemoryPartitionTable::new(BLOCK as u32).with_partition("p", start, count);
                    mmc.clear_trace();
                    let erased = {
                        let resolver = PartitionResolver::new().with_dynamic_table(&table);
                        let mut prov = Provisioner::new(
                            &mut mmc,
                            resolver,
                            BootAccessController::default(),
                            AndroidSparseDecoder::new(),
                        );
                        prov.erase("p").into_result().unwrap().blocks_erased
                    };

                    let lo = start.div_ceil(group) * group;
                    let hi = (start + count) / group * group;
                    let expected = hi.saturating_sub(lo);
                    assert_eq!(erased, expected, "S={} C={} G={}", start, count, group);

                    let erases: Vec<_> = mmc
                        .trace()
                        .iter()
                        .filter_map(|t| match *t {
                            Transaction::Erase { start, count, .. } => Some((start, count)),
                            _ => None,
                        })
                        .collect();
                    if expected == 0 {
                        assert!(erases.is_empty());
                    } else {
                        assert_eq!(erases, vec![(lo, expected)]);
                        // Never outside the region.
                        assert!(lo >= start && lo + expected <= start + count);
                    }

                    let user = mmc.area_mut(Area::User);
                    let window = &mut user[..((start + count + group) * BLOCK) as usize];
                    for (block, bytes) in window.chunks(BLOCK as usize).enumerate() {
                        let block = block as u64;
                        let inside = block >= lo && block < lo + expected;
                        assert!(bytes.iter().all(|&b| b == if inside { 0xff } else { 0 }));
                    }
                    window.fill(0);
                }
            }
        }
    }

    #[test]
    fn test_repeated_protected_sessions_are_idempotent() {
        init_logging();
        let mut mmc = emulated_board();
        let mut prov = board_provisioner(&mut mmc);

        assert!(prov.flash("bootloader", &[1u8; 512]).is_ok());
        let after_first = *prov.device().ext_csd();
        for round in 0..4u8 {
            assert!(prov.flash("bootloader", &[round; 512]).is_ok());
            assert!(prov.erase("env").is_ok());
            assert_eq!(*prov.device().ext_csd(), after_first);
            assert_eq!(prov.device().partition_access(), Some(Area::User));
        }
    }
}
