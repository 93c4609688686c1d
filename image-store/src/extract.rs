// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Archive extraction for stored files.  Bootloader payloads arrive as
//! (possibly compressed) tarballs and are unpacked next to the store.

use camino::Utf8Path;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;

enum Compression {
    Gzip,
    Xz,
    None,
}

fn detect_compression(magic: &[u8]) -> Compression {
    if magic.starts_with(&[0x1f, 0x8b]) {
        Compression::Gzip
    } else if magic.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Compression::Xz
    } else {
        Compression::None
    }
}

fn unpack<R: Read>(reader: R, dest: &Utf8Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest)
}

/// Unpacks the tar archive at `source` into `dest`, creating `dest` (with
/// permissive directory modes) if absent.  Compression is detected from the
/// leading magic bytes; gzip, xz and plain tar are understood.
pub(crate) fn unpack_archive(
    source: &Utf8Path,
    dest: &Utf8Path,
) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;

    let mut file = File::open(source)?;
    let mut magic = [0u8; 6];
    let n = file.read(&mut magic)?;
    file.rewind()?;

    match detect_compression(&magic[..n]) {
        Compression::Gzip => {
            unpack(flate2::read::GzDecoder::new(file), dest)
        }
        Compression::Xz => unpack(xz2::read::XzDecoder::new(file), dest),
        Compression::None => unpack(file, dest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use std::io::Write;

    fn build_tarball(paths: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in paths {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn unpacks_plain_tar() {
        let dir = Utf8TempDir::new().unwrap();
        let tarball = build_tarball(&[("grubx64.efi", b"efi payload")]);
        let source = dir.path().join("archive.tar");
        std::fs::write(&source, tarball).unwrap();

        let dest = dir.path().join("bootloaders/uefi/amd64");
        unpack_archive(&source, &dest).unwrap();
        assert_eq!(
            std::fs::read(dest.join("grubx64.efi")).unwrap(),
            b"efi payload"
        );
    }

    #[test]
    fn unpacks_gzip_tar() {
        let dir = Utf8TempDir::new().unwrap();
        let tarball = build_tarball(&[("shim.efi", b"shim payload")]);
        let mut encoder = flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::default(),
        );
        encoder.write_all(&tarball).unwrap();
        let gz = encoder.finish().unwrap();
        let source = dir.path().join("archive.tar.gz");
        std::fs::write(&source, gz).unwrap();

        let dest = dir.path().join("out");
        unpack_archive(&source, &dest).unwrap();
        assert_eq!(
            std::fs::read(dest.join("shim.efi")).unwrap(),
            b"shim payload"
        );
    }

    #[test]
    fn creates_nested_target_directories() {
        let dir = Utf8TempDir::new().unwrap();
        let tarball = build_tarball(&[("f", b"x")]);
        let source = dir.path().join("a.tar");
        std::fs::write(&source, tarball).unwrap();

        let dest = dir.path().join("deeply/nested/target");
        unpack_archive(&source, &dest).unwrap();
        assert!(dest.join("f").is_file());
    }
}
