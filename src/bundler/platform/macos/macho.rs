//! Mach-O detection and architecture listing.
//!
//! Replaces `file`/`lipo -info` probing with in-process header parsing via
//! goblin. Only the header (thin) or the fat arch table is inspected.

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::settings::Arch;
use goblin::mach::Mach;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Fat headers share their magic with Java class files. Class files store
/// their major version (45 or later) where fat files store the slice count.
const MAX_FAT_ARCHES: usize = 45;

/// One architecture slice of a Mach-O file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slice {
    /// Mach-O `cputype`
    pub cpu_type: u32,
    /// Mach-O `cpusubtype`
    pub cpu_subtype: u32,
}

impl Slice {
    /// Architecture of this slice, if it is one we build for.
    pub fn arch(&self) -> Option<Arch> {
        Arch::from_cpu_type(self.cpu_type)
    }
}

/// Returns whether the file starts with a thin or fat Mach-O header.
///
/// Files shorter than a header are not Mach-O.
pub async fn is_mach_o(path: &Path) -> Result<bool> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for Mach-O detection", path)?;

    let mut magic = [0u8; 16];
    match file.read_exact(&mut magic).await {
        Ok(_) => Ok(is_mach_o_header(&magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).fs_context("reading Mach-O header", path),
    }
}

/// Returns whether the first 16 bytes of a file are a Mach-O header.
pub fn is_mach_o_header(bytes: &[u8; 16]) -> bool {
    match goblin::peek_bytes(bytes) {
        Ok(goblin::Hint::Mach(_)) => true,
        Ok(goblin::Hint::MachFat(narches)) => narches > 0 && narches < MAX_FAT_ARCHES,
        _ => false,
    }
}

/// Lists the architecture slices in a Mach-O buffer.
pub fn parse_slices(bytes: &[u8]) -> Result<Vec<Slice>> {
    match Mach::parse(bytes)? {
        Mach::Binary(macho) => Ok(vec![Slice {
            cpu_type: macho.header.cputype,
            cpu_subtype: macho.header.cpusubtype,
        }]),
        Mach::Fat(multi) => {
            let mut slices = Vec::with_capacity(multi.narches);
            for arch in multi.iter_arches() {
                let arch = arch?;
                slices.push(Slice {
                    cpu_type: arch.cputype,
                    cpu_subtype: arch.cpusubtype,
                });
            }
            Ok(slices)
        }
    }
}

/// Returns the known architectures a Mach-O file carries.
///
/// Slices for architectures this tool does not build (i386, ppc) are
/// skipped.
pub async fn architectures(path: &Path) -> Result<Vec<Arch>> {
    let bytes = tokio::fs::read(path)
        .await
        .fs_context("reading Mach-O file", path)?;

    let mut archs: Vec<Arch> = parse_slices(&bytes)?
        .iter()
        .filter_map(Slice::arch)
        .collect();
    archs.sort();
    archs.dedup();
    Ok(archs)
}
