//! CHARMM/NAMD DCD trajectories.
//!
//! A DCD file is a sequence of Fortran unformatted records, each one wrapped by two 32-bit
//! markers holding the record length:
//!
//! ```text
//! [84] "CORD" ICNTRL[20]                  [84]
//! [..] NTITLE TITLE[NTITLE; 80 bytes]     [..]
//! [4]  NATOMS                             [4]
//! for each frame:
//!     [48]   unit cell, 6 f64            [48]      (CHARMM, ICNTRL[10] != 0)
//!     [4N]   X                           [4N]
//!     [4N]   Y                           [4N]
//!     [4N]   Z                           [4N]
//!     [4N]   W                           [4N]      (CHARMM, ICNTRL[11] != 0)
//! ```
//!
//! The endianness is detected from the first record marker.
use std::fs;
use std::io::{
    Cursor,
    Read,
    Seek,
    SeekFrom,
    Write,
};
use std::path::Path;

use byteorder::{
    BigEndian,
    ByteOrder,
    LittleEndian,
    ReadBytesExt,
    WriteBytesExt,
};
use shared::{
    Context,
    Result,
    Trajectory,
    bail,
    ensure,
    warn,
    trajectory::check_atom_indices,
};

use crate::ANGSTROM_PER_NM;


#[derive(Clone, Debug, PartialEq)]
pub struct DcdHeader {
    /// Frame count claimed by the header, NAMD leaves it stale for interrupted runs.
    pub nset:          usize,
    pub istart:        i32,
    pub nsavc:         i32,
    pub delta:         f32,
    pub natoms:        usize,
    pub charmm:        bool,
    pub has_unit_cell: bool,
    pub has_4dims:     bool,
    pub titles:        Vec<String>,
}


impl DcdHeader {
    fn frame_size(&self) -> usize {
        let block = 4 * self.natoms + 8;
        let cell  = if self.has_unit_cell { 48 + 8 } else { 0 };
        let dims  = if self.has_4dims { 4 } else { 3 };
        cell + dims * block
    }
}


pub struct Dcd {
    pub header: DcdHeader,
    pub traj:   Trajectory,
}


impl Dcd {
    /// Read all the frames, keeping only `atom_indices` (in their order) if given.
    pub fn from_file<P>(fname: P, atom_indices: Option<&[usize]>) -> Result<Self>
    where P: AsRef<Path> {
        let bytes = fs::read(fname.as_ref())
            .with_context(|| format!("Failed to read {:?}.", fname.as_ref()))?;
        Self::from_bytes(&bytes, atom_indices)
            .with_context(|| format!("Failed to parse {:?} as DCD.", fname.as_ref()))
    }

    pub fn from_bytes(bytes: &[u8], atom_indices: Option<&[usize]>) -> Result<Self> {
        ensure!(bytes.len() >= 4, "File is too short to hold a DCD header.");

        if LittleEndian::read_i32(&bytes[.. 4]) == 84 {
            Self::parse::<LittleEndian>(bytes, atom_indices)
        } else if BigEndian::read_i32(&bytes[.. 4]) == 84 {
            Self::parse::<BigEndian>(bytes, atom_indices)
        } else {
            bail!("Leading record marker is not 84 in either byte order.")
        }
    }

    fn parse<E: ByteOrder>(bytes: &[u8], atom_indices: Option<&[usize]>) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let header  = read_header::<E>(&mut cur)?;
        let natoms  = header.natoms;

        let idx = match atom_indices {
            Some(idx) => {
                check_atom_indices(idx, natoms)?;
                idx.to_vec()
            },
            None => (0 .. natoms).collect(),
        };

        let header_size = cur.position() as usize;
        let frame_size  = header.frame_size();
        let nframes     = (bytes.len() - header_size) / frame_size;
        let remainder   = (bytes.len() - header_size) % frame_size;

        if remainder != 0 {
            warn!("DCD ends with a partial frame of {} bytes, ignored.", remainder);
        }
        if header.nset != 0 && header.nset != nframes {
            warn!("DCD header claims {} frames but {} are stored, using the latter.", header.nset, nframes);
        }

        let mut x = vec![0f32; natoms];
        let mut y = vec![0f32; natoms];
        let mut z = vec![0f32; natoms];
        let mut data = Vec::with_capacity(nframes * idx.len() * 3);

        for _ in 0 .. nframes {
            if header.has_unit_cell {
                skip_record::<E>(&mut cur, 48)?;
            }
            read_f32_record::<E>(&mut cur, &mut x)?;
            read_f32_record::<E>(&mut cur, &mut y)?;
            read_f32_record::<E>(&mut cur, &mut z)?;
            if header.has_4dims {
                skip_record::<E>(&mut cur, 4 * natoms)?;
            }

            for &i in idx.iter() {
                data.extend([x[i], y[i], z[i]].map(|v| v / ANGSTROM_PER_NM));
            }
        }

        let traj = Trajectory::from_flat(nframes, idx.len(), data)?;
        Ok(Self { header, traj })
    }
}


/// Write `traj` as a little-endian CHARMM-flavoured DCD without unit cells.
pub fn write_dcd<P>(fname: P, traj: &Trajectory) -> Result<()>
where P: AsRef<Path> {
    let bytes = encode::<LittleEndian>(traj, false)?;
    fs::write(fname.as_ref(), bytes)
        .with_context(|| format!("Failed to write {:?}.", fname.as_ref()))?;
    Ok(())
}


fn encode<E: ByteOrder>(traj: &Trajectory, with_unit_cell: bool) -> Result<Vec<u8>> {
    let nframes = traj.n_frames() as i32;
    let natoms  = traj.n_atoms() as i32;
    let mut buf: Vec<u8> = vec![];

    let mut icntrl = [0i32; 20];
    icntrl[0]  = nframes;
    icntrl[1]  = 1;
    icntrl[2]  = 1;
    icntrl[3]  = nframes;
    icntrl[10] = with_unit_cell as i32;
    icntrl[19] = 24;

    buf.write_i32::<E>(84)?;
    buf.write_all(b"CORD")?;
    for v in icntrl {
        buf.write_i32::<E>(v)?;
    }
    buf.write_i32::<E>(84)?;

    let title = format!("{:<80}", "REMARKS written by md_parsers");
    buf.write_i32::<E>(4 + 80)?;
    buf.write_i32::<E>(1)?;
    buf.write_all(title.as_bytes())?;
    buf.write_i32::<E>(4 + 80)?;

    buf.write_i32::<E>(4)?;
    buf.write_i32::<E>(natoms)?;
    buf.write_i32::<E>(4)?;

    for frame in traj.xyz.outer_iter() {
        if with_unit_cell {
            buf.write_i32::<E>(48)?;
            for v in [50.0f64, 90.0, 50.0, 90.0, 90.0, 50.0] {
                buf.write_f64::<E>(v)?;
            }
            buf.write_i32::<E>(48)?;
        }

        for k in 0 .. 3 {
            buf.write_i32::<E>(4 * natoms)?;
            for v in frame.column(k) {
                buf.write_f32::<E>(v * ANGSTROM_PER_NM)?;
            }
            buf.write_i32::<E>(4 * natoms)?;
        }
    }

    Ok(buf)
}


fn read_header<E: ByteOrder>(cur: &mut Cursor<&[u8]>) -> Result<DcdHeader> {
    let block = read_record::<E>(cur)?;
    ensure!(block.len() == 84, "First record should hold 84 bytes, got {}.", block.len());
    ensure!(&block[.. 4] == b"CORD", "Magic \"CORD\" not found.");

    let icntrl = block[4 ..].chunks_exact(4)
        .map(E::read_i32)
        .collect::<Vec<i32>>();

    let charmm = icntrl[19] != 0;
    let delta  = if charmm {
        E::read_f32(&block[40 .. 44])
    } else {
        E::read_f64(&block[40 .. 48]) as f32
    };

    let nfixed = icntrl[8];
    if nfixed != 0 {
        bail!("DCD with {} fixed atoms is not supported.", nfixed);
    }

    let block = read_record::<E>(cur)?;
    ensure!(block.len() >= 4, "Title record is too short.");
    let ntitle = E::read_i32(&block[.. 4]).max(0) as usize;
    let titles = block[4 ..].chunks(80)
        .take(ntitle)
        .map(|t| String::from_utf8_lossy(t).trim_end().to_string())
        .collect::<Vec<_>>();

    let block = read_record::<E>(cur)?;
    ensure!(block.len() == 4, "Atom count record should hold 4 bytes, got {}.", block.len());
    let natoms = E::read_i32(&block);
    ensure!(natoms > 0, "DCD holds a non-positive atom count {}.", natoms);

    Ok(DcdHeader {
        nset:          icntrl[0].max(0) as usize,
        istart:        icntrl[1],
        nsavc:         icntrl[2],
        delta,
        natoms:        natoms as usize,
        charmm,
        has_unit_cell: charmm && icntrl[10] != 0,
        has_4dims:     charmm && icntrl[11] != 0,
        titles,
    })
}


fn read_marker<E: ByteOrder>(cur: &mut Cursor<&[u8]>) -> Result<usize> {
    let len = cur.read_i32::<E>()?;
    ensure!(len >= 0, "Negative Fortran record length {}.", len);
    Ok(len as usize)
}


fn check_tail<E: ByteOrder>(cur: &mut Cursor<&[u8]>, len: usize) -> Result<()> {
    let tail = read_marker::<E>(cur)?;
    ensure!(tail == len, "Mismatched Fortran record markers: {} and {}.", len, tail);
    Ok(())
}


fn read_record<E: ByteOrder>(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = read_marker::<E>(cur)?;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)?;
    check_tail::<E>(cur, len)?;
    Ok(buf)
}


fn skip_record<E: ByteOrder>(cur: &mut Cursor<&[u8]>, expected: usize) -> Result<()> {
    let len = read_marker::<E>(cur)?;
    ensure!(len == expected, "Expected a record of {} bytes, got {}.", expected, len);
    cur.seek(SeekFrom::Current(len as i64))?;
    check_tail::<E>(cur, len)
}


fn read_f32_record<E: ByteOrder>(cur: &mut Cursor<&[u8]>, out: &mut [f32]) -> Result<()> {
    let len = read_marker::<E>(cur)?;
    ensure!(len == 4 * out.len(), "Expected a coordinate record of {} bytes, got {}.", 4 * out.len(), len);
    cur.read_f32_into::<E>(out)?;
    check_tail::<E>(cur, len)
}
