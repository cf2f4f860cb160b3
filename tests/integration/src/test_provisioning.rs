// Licensed under the Apache-2.0 license

//! End-to-end provisioning requests against the emulated device.

#[cfg(test)]
mod test {
    use crate::test::{board_provisioner, emulated_board, init_logging};
    use fb_hw_model::{Area, EmulatedMmc, MemoryPartitionTable, Transaction};
    use fb_mmc::{
        AccessSession, AliasTable, BootAccessController, DeviceError, ImageKind, PartitionAlias,
        PartitionResolver, ProvisionError, Provisioner, WriteError,
    };
    use fb_sparse::{
        AndroidSparseDecoder, ChunkHeader, ChunkType, SparseDecoder, SparseError, SparseHeader,
        SparseStorage, SparseSummary, SparseTarget,
    };
    use zerocopy::{FromBytes, FromZeros, IntoBytes};

    fn writes(mmc: &EmulatedMmc) -> Vec<(Area, u64, u64)> {
        mmc.trace()
            .iter()
            .filter_map(|t| match *t {
                Transaction::Write { area, start, count } => Some((area, start, count)),
                _ => None,
            })
            .collect()
    }

    /// Positions of SWITCH commands and of the first bulk write in the trace.
    fn switch_and_write_positions(mmc: &EmulatedMmc) -> (Vec<usize>, Option<usize>) {
        let switches = mmc
            .trace()
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Transaction::Command { index: 6, .. }))
            .map(|(pos, _)| pos)
            .collect();
        let write = mmc
            .trace()
            .iter()
            .position(|t| matches!(t, Transaction::Write { .. }));
        (switches, write)
    }

    #[test]
    fn test_env_raw_write() {
        init_logging();
        let mut mmc = emulated_board();

        let payload: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
        let report = board_provisioner(&mut mmc).flash("env", &payload);
        let target = report.target.unwrap();
        assert_eq!(
            (target.start_block, target.block_count, target.is_protected()),
            (0x0001, 0x0020, false)
        );
        assert_eq!(report.response().message(), "wrote 4096 bytes to 'env'");
        assert_eq!(writes(&mmc), vec![(Area::User, 1, 8)]);
        assert_eq!(&mmc.area(Area::User)[512..512 + 4096], payload.as_slice());

        mmc.clear_trace();
        let report = board_provisioner(&mut mmc).flash("env", &vec![0u8; 0x20 * 512 + 1]);
        assert_eq!(
            report.result.unwrap_err(),
            ProvisionError::Write(WriteError::TooLarge {
                required: 0x21,
                capacity: 0x20
            })
        );
        assert_eq!(report.response().message(), "too large for partition");
        assert!(writes(&mmc).is_empty());
    }

    #[test]
    fn test_bootloader_write_wrapped_in_boot_access() {
        init_logging();
        let mut mmc = emulated_board();

        let report = board_provisioner(&mut mmc).flash("bootloader", &[0x5A; 2048]);
        assert!(report.target.unwrap().is_protected());
        assert!(report.response().is_okay());

        let (switches, write) = switch_and_write_positions(&mmc);
        let write = write.unwrap();
        assert_eq!(switches.len(), 4);
        assert!(switches[1] < write && write < switches[2]);
        assert_eq!(writes(&mmc), vec![(Area::Boot1, 0, 4)]);
        assert_eq!(
            mmc.switch_args(),
            vec![0x03B3_4900, 0x03B1_0100, 0x03B3_4800, 0x03B1_0100]
        );
        assert_eq!(mmc.partition_access(), Some(Area::User));
        assert!(mmc.area(Area::Boot1)[..2048].iter().all(|&b| b == 0x5A));
        assert!(mmc.area(Area::User)[..2048].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bootloader_close_after_failed_write() {
        init_logging();
        let mut mmc = emulated_board();
        mmc.faults_mut().transfer_limit = Some(1);

        let report = board_provisioner(&mut mmc).flash("bootloader", &[0x5A; 2048]);
        assert_eq!(
            report.result.unwrap_err(),
            ProvisionError::Write(WriteError::DeviceShortWrite {
                requested: 4,
                written: 1
            })
        );
        assert_eq!(report.close_error, None);
        assert_eq!(
            report.response().message(),
            "failed writing to device (1 of 4 blocks)"
        );

        let (switches, write) = switch_and_write_positions(&mmc);
        let write = write.unwrap();
        assert_eq!(switches.len(), 4);
        assert!(switches[1] < write && write < switches[2]);
        assert_eq!(mmc.partition_access(), Some(Area::User));
    }

    #[test]
    fn test_erase_smaller_than_group() {
        init_logging();
        let mut mmc = emulated_board().with_erase_group(16);
        let table = MemoryPartitionTable::new(512).with_partition("misc", 100, 10);
        let resolver = PartitionResolver::new().with_dynamic_table(&table);
        let mut prov = Provisioner::new(
            &mut mmc,
            resolver,
            BootAccessController::default(),
            AndroidSparseDecoder::new(),
        );

        let report = prov.erase("misc");
        assert_eq!(report.result.unwrap().blocks_erased, 0);
        assert_eq!(report.response().message(), "erased 0 bytes from 'misc'");
        drop(prov);
        assert!(!mmc
            .trace()
            .iter()
            .any(|t| matches!(t, Transaction::Erase { .. })));
    }

    #[test]
    fn test_erase_kernel_region() {
        init_logging();
        let mut mmc = emulated_board();
        let report = board_provisioner(&mut mmc).erase("kernel");
        assert_eq!(report.result.unwrap().blocks_erased, 0x2000);
        assert_eq!(
            mmc.trace(),
            &[Transaction::Erase {
                area: Area::User,
                start: 0x200,
                count: 0x2000
            }]
        );

        // env (blocks 1..0x21) aligns up to block 16, leaving 17 usable
        // blocks: one group.
        mmc.clear_trace();
        let report = board_provisioner(&mut mmc).erase("env");
        assert_eq!(report.result.unwrap().blocks_erased, 16);
        assert_eq!(
            mmc.trace(),
            &[Transaction::Erase {
                area: Area::User,
                start: 16,
                count: 16
            }]
        );
    }

    /// Decoder stand-in that writes the payload after the sparse header one
    /// block at a time and stops at the ceiling it was given.
    struct CeilingDecoder;

    impl SparseDecoder for CeilingDecoder {
        fn write_image(
            &mut self,
            target: &SparseTarget,
            storage: &mut dyn SparseStorage,
            image: &[u8],
        ) -> Result<SparseSummary, SparseError> {
            let data = &image[fb_sparse::header::SPARSE_HEADER_LEN..];
            let bs = target.block_size as usize;
            let end = target.start_block + target.block_count;
            let mut summary = SparseSummary::default();
            for (i, block) in data.chunks(bs).enumerate() {
                let lba = target.start_block + i as u64;
                if lba + 1 > end {
                    return Err(SparseError::ExceedsPartition { index: i as u32 });
                }
                if storage.write(lba, 1, block) != 1 {
                    return Err(SparseError::WriteFailed {
                        index: i as u32,
                        requested: 1,
                        written: 0,
                    });
                }
                summary.blocks += 1;
                summary.bytes_written += block.len() as u64;
                summary.chunks += 1;
            }
            Ok(summary)
        }
    }

    #[test]
    fn test_sparse_payload_stops_at_ceiling() {
        init_logging();
        let mut mmc = emulated_board();
        let mut image = SparseHeader::new(512, 0x40, 1).as_bytes().to_vec();
        image.extend_from_slice(&vec![0xC3; 0x40 * 512]);

        let mut prov = Provisioner::new(
            &mut mmc,
            crate::test::board_resolver(),
            BootAccessController::default(),
            CeilingDecoder,
        );
        let report = prov.flash("env", &image);
        assert_eq!(
            report.result.unwrap_err(),
            ProvisionError::Write(WriteError::Sparse(SparseError::ExceedsPartition {
                index: 0x20
            }))
        );
        drop(prov);

        let env_end = 0x0001 + 0x0020;
        let written = writes(&mmc);
        assert_eq!(written.len(), 0x20);
        assert!(written.iter().all(|&(_, start, count)| start + count <= env_end));
        // device_tree, right after env, is untouched.
        assert!(mmc.area(Area::User)[env_end as usize * 512..(env_end as usize + 1) * 512]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_android_sparse_image_to_kernel() {
        init_logging();
        let mut mmc = emulated_board();
        let mut image = SparseHeader::new(4096, 3, 3).as_bytes().to_vec();
        image.extend_from_slice(ChunkHeader::new(ChunkType::Raw, 1, 4096).as_bytes());
        image.extend_from_slice(&[0x77; 4096]);
        image.extend_from_slice(ChunkHeader::new(ChunkType::DontCare, 1, 0).as_bytes());
        image.extend_from_slice(ChunkHeader::new(ChunkType::Fill, 1, 4).as_bytes());
        image.extend_from_slice(&[1, 2, 3, 4]);

        let report = board_provisioner(&mut mmc).flash("kernel", &image);
        let outcome = report.result.unwrap();
        assert_eq!(outcome.image, ImageKind::Sparse);
        assert_eq!(outcome.blocks_written, 24);
        assert_eq!(writes(&mmc), vec![(Area::User, 0x200, 8), (Area::User, 0x210, 8)]);

        let user = mmc.area(Area::User);
        assert_eq!(user[0x200 * 512], 0x77);
        assert_eq!(user[0x208 * 512], 0);
        assert_eq!(&user[0x210 * 512..0x210 * 512 + 8], &[1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn test_read_back_region() {
        init_logging();
        let mut mmc = emulated_board();
        let mut prov = board_provisioner(&mut mmc);
        assert!(prov.flash("bootloader", &[0xE1; 1536]).is_ok());

        let mut buf = vec![0u8; 0x500 * 512];
        let report = prov.read("bootloader", &mut buf);
        assert_eq!(report.response().message(), "read 655360 bytes from 'bootloader'");
        assert!(buf[..1536].iter().all(|&b| b == 0xE1));
        assert!(buf[1536..].iter().all(|&b| b == 0));
        assert_eq!(prov.boot_access().session(), AccessSession::Closed);
    }

    #[test]
    fn test_alias_resolution_through_dynamic_table() {
        init_logging();
        let mut mmc = emulated_board();
        let table = MemoryPartitionTable::new(512).with_partition("system", 0x3000, 0x100);
        let aliases = AliasTable(&[PartitionAlias {
            name: "rootfs",
            target: "system",
        }]);
        let resolver = crate::test::board_resolver()
            .with_dynamic_table(&table)
            .with_aliases(&aliases);
        let mut prov = Provisioner::new(
            &mut mmc,
            resolver,
            BootAccessController::default(),
            AndroidSparseDecoder::new(),
        );

        let report = prov.flash("rootfs", &[0x42; 512]);
        assert_eq!(report.response().message(), "wrote 512 bytes to 'rootfs'");
        drop(prov);
        assert_eq!(writes(&mmc), vec![(Area::User, 0x3000, 1)]);
    }

    #[test]
    fn test_missing_device_and_unknown_target() {
        init_logging();
        let mut mmc = emulated_board();
        let report = board_provisioner(&mut mmc).flash("recovery", &[0u8; 16]);
        assert_eq!(report.result.unwrap_err(), ProvisionError::NotFound);
        assert_eq!(report.response().message(), "cannot find partition");

        mmc.set_present(false);
        let report = board_provisioner(&mut mmc).flash("env", &[0u8; 16]);
        assert_eq!(
            report.result.unwrap_err(),
            ProvisionError::Device(DeviceError::NoDevice)
        );
        assert_eq!(report.response().message(), "invalid mmc device");
        assert!(mmc.trace().is_empty());
    }

    #[test]
    fn test_zimage_update() {
        use fb_mmc::zimage::{AndroidBootHeader, BOOT_MAGIC};

        init_logging();
        let mut mmc = emulated_board();
        // Boot image in a "boot" partition at block 0x1000, 2 KiB pages.
        let base = 0x1000 * 512;
        let mut hdr = AndroidBootHeader::new_zeroed();
        hdr.magic = *BOOT_MAGIC;
        hdr.page_size = 2048;
        hdr.kernel_size = 2048;
        hdr.ramdisk_size = 1000;
        {
            let user = mmc.area_mut(Area::User);
            user[base..base + hdr.as_bytes().len()].copy_from_slice(hdr.as_bytes());
            user[base + 2048..base + 4096].fill(0x4B);
            user[base + 4096..base + 5096].fill(0x52);
        }

        let table = MemoryPartitionTable::new(512).with_partition("boot", 0x1000, 0x100);
        let resolver = PartitionResolver::new().with_dynamic_table(&table);
        let mut scratch = vec![0u8; 64 * 1024];
        let mut prov = Provisioner::new(
            &mut mmc,
            resolver,
            BootAccessController::default(),
            AndroidSparseDecoder::new(),
        )
        .with_scratch(&mut scratch);

        let report = prov.flash("zImage", &[0x4E; 5000]);
        assert_eq!(
            report.response().message(),
            "zImage was updated in boot partition"
        );
        drop(prov);

        let user = mmc.area(Area::User);
        let new_hdr = AndroidBootHeader::read_from_prefix(&user[base..]).unwrap().0;
        assert_eq!(new_hdr.kernel_size, 5000);
        assert!(user[base + 2048..base + 2048 + 5000].iter().all(|&b| b == 0x4E));
        // Kernel now spans 3 pages; ramdisk follows at page 4.
        assert!(user[base + 8192..base + 8192 + 1000].iter().all(|&b| b == 0x52));
    }
}
