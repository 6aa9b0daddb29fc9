//! Binary `.ctx` graph file format (version 6 only): header layout,
//! mmap-backed bulk reader, streaming filter, header/kmer merge, and
//! writer.
//!
//! Grounded on `examples/original_source/src/graph/graph_format.h`'s
//! header layout and its `graph_load` / `graph_reader_merge_headers` /
//! `graph_files_merge` / `graph_stream_filter` / `graph_file_save`
//! operations. Bad magic, an unsupported version, or a truncated
//! record are surfaced as `GraphError` variants rather than aborting
//! the process directly — the same refinement already made for
//! `KmerHashTable::find_or_insert`'s bucket-saturation case: a library
//! function returns `Result`, and only a CLI's `main` turns a
//! propagated error into a logged `die!` and non-zero exit.

use crate::error::{GraphError, Result};
use crate::graph_store::{Edges, GraphStore};
use crate::hashtable::{HKey, KmerHashTable};
use crate::kmer::{words_for_kmer_size, BinaryKmer};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 6] = b"CORTEX";
pub const FORMAT_VERSION: u32 = 6;

fn read_magic<R: Read>(r: &mut R, what: &'static str) -> Result<()> {
    let mut buf = [0u8; 6];
    r.read_exact(&mut buf).map_err(|_| GraphError::BadMagic { what })?;
    if &buf != MAGIC {
        return Err(GraphError::BadMagic { what });
    }
    Ok(())
}

fn read_len_prefixed_string<R: Read>(r: &mut R, field: &'static str, path: &str) -> Result<String> {
    let len = r.read_u32::<LittleEndian>().map_err(|_| GraphError::Truncated {
        field,
        expected: 4,
        got: 0,
        path: path.to_string(),
    })? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|_| GraphError::Truncated {
        field,
        expected: len,
        got: 0,
        path: path.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_len_prefixed_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())
}

/// Per-color cleaning provenance and sample metadata, one block per
/// color in the file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorInfo {
    pub mean_read_length: u32,
    pub total_sequence: u64,
    pub sample_name: String,
    pub sequencing_error_rate: f64,
    pub is_tip_clipping_applied: bool,
    pub has_low_covg_supernodes_removed: bool,
    pub has_low_covg_kmers_removed: bool,
    pub is_graph_cleaned: bool,
    pub low_covg_supernodes_thresh: u32,
    pub low_covg_kmer_thresh: u32,
    pub cleaned_against_name: String,
}

impl ColorInfo {
    /// A fresh, unclean color block for a sample that hasn't been
    /// through any cleaning pass yet.
    pub fn new(sample_name: impl Into<String>) -> Self {
        Self {
            mean_read_length: 0,
            total_sequence: 0,
            sample_name: sample_name.into(),
            sequencing_error_rate: 0.0,
            is_tip_clipping_applied: false,
            has_low_covg_supernodes_removed: false,
            has_low_covg_kmers_removed: false,
            is_graph_cleaned: false,
            low_covg_supernodes_thresh: 0,
            low_covg_kmer_thresh: 0,
            cleaned_against_name: String::new(),
        }
    }

    fn read<R: Read>(r: &mut R, path: &str) -> Result<Self> {
        let mean_read_length = r.read_u32::<LittleEndian>()?;
        let total_sequence = r.read_u64::<LittleEndian>()?;
        let sample_name = read_len_prefixed_string(r, "sample_name", path)?;
        let sequencing_error_rate = r.read_f64::<LittleEndian>()?;
        let is_tip_clipping_applied = r.read_u8()? != 0;
        let has_low_covg_supernodes_removed = r.read_u8()? != 0;
        let has_low_covg_kmers_removed = r.read_u8()? != 0;
        let is_graph_cleaned = r.read_u8()? != 0;
        let low_covg_supernodes_thresh = r.read_u32::<LittleEndian>()?;
        let low_covg_kmer_thresh = r.read_u32::<LittleEndian>()?;
        let cleaned_against_name = read_len_prefixed_string(r, "cleaned_against_name", path)?;
        Ok(Self {
            mean_read_length,
            total_sequence,
            sample_name,
            sequencing_error_rate,
            is_tip_clipping_applied,
            has_low_covg_supernodes_removed,
            has_low_covg_kmers_removed,
            is_graph_cleaned,
            low_covg_supernodes_thresh,
            low_covg_kmer_thresh,
            cleaned_against_name,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.mean_read_length)?;
        w.write_u64::<LittleEndian>(self.total_sequence)?;
        write_len_prefixed_string(w, &self.sample_name)?;
        w.write_f64::<LittleEndian>(self.sequencing_error_rate)?;
        w.write_u8(self.is_tip_clipping_applied as u8)?;
        w.write_u8(self.has_low_covg_supernodes_removed as u8)?;
        w.write_u8(self.has_low_covg_kmers_removed as u8)?;
        w.write_u8(self.is_graph_cleaned as u8)?;
        w.write_u32::<LittleEndian>(self.low_covg_supernodes_thresh)?;
        w.write_u32::<LittleEndian>(self.low_covg_kmer_thresh)?;
        write_len_prefixed_string(w, &self.cleaned_against_name)
    }
}

/// The fixed-layout portion of a `.ctx` file: magic, version, per-kmer
/// word count, kmer size, and one [`ColorInfo`] block per color.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFileHeader {
    pub version: u32,
    pub kmer_size: usize,
    pub num_words: usize,
    pub colors: Vec<ColorInfo>,
}

impl GraphFileHeader {
    pub fn new(kmer_size: usize, colors: Vec<ColorInfo>) -> Self {
        Self {
            version: FORMAT_VERSION,
            kmer_size,
            num_words: words_for_kmer_size(kmer_size),
            colors,
        }
    }

    #[inline]
    pub fn num_colors(&self) -> usize {
        self.colors.len()
    }

    fn read<R: Read>(r: &mut R, path: &str) -> Result<Self> {
        read_magic(r, "graph file header")?;
        let version = r.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(GraphError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
        }
        let num_words = r.read_u32::<LittleEndian>()? as usize;
        let kmer_size = r.read_u32::<LittleEndian>()? as usize;
        let num_colors = r.read_u32::<LittleEndian>()? as usize;

        if num_words != words_for_kmer_size(kmer_size) {
            return Err(GraphError::Truncated {
                field: "word_count_per_kmer",
                expected: words_for_kmer_size(kmer_size),
                got: num_words,
                path: path.to_string(),
            });
        }

        let mut colors = Vec::with_capacity(num_colors);
        for _ in 0..num_colors {
            colors.push(ColorInfo::read(r, path)?);
        }

        read_magic(r, "graph file footer")?;

        Ok(Self { version, kmer_size, num_words, colors })
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.num_words as u32)?;
        w.write_u32::<LittleEndian>(self.kmer_size as u32)?;
        w.write_u32::<LittleEndian>(self.colors.len() as u32)?;
        for c in &self.colors {
            c.write(w)?;
        }
        w.write_all(MAGIC)
    }

    /// Encoded header size in bytes (used to locate the first kmer
    /// record in the file).
    pub fn encoded_len(&self) -> usize {
        let mut fixed = 6 + 4 + 4 + 4 + 4 + 6; // two magics + version/words/ksize/ncols
        for c in &self.colors {
            fixed += 4 + 8 + 4 + c.sample_name.len() + 8 + 1 + 1 + 1 + 1 + 4 + 4 + 4 + c.cleaned_against_name.len();
        }
        fixed
    }

    /// Per-kmer record size: packed words, one `u32` covg and one `u8`
    /// edges byte per color.
    pub fn record_len(&self) -> usize {
        self.num_words * 8 + self.colors.len() * (4 + 1)
    }

    /// Combine several file headers into one multi-color header, the
    /// way `graph_reader_merge_headers` concatenates color blocks from
    /// each input file in order. Every header must agree on
    /// `kmer_size`. If `intersect_gname` is given, it is recorded as
    /// the `cleaned_against_name` for colors that don't already carry
    /// one.
    pub fn merge(headers: &[GraphFileHeader], intersect_gname: Option<&str>) -> Result<GraphFileHeader> {
        let kmer_size = headers
            .first()
            .ok_or_else(|| GraphError::MissingInput("no headers to merge".to_string()))?
            .kmer_size;
        if headers.iter().any(|h| h.kmer_size != kmer_size) {
            return Err(GraphError::InvalidKmer("headers disagree on kmer_size".to_string()));
        }

        let mut colors = Vec::new();
        for h in headers {
            for mut c in h.colors.clone() {
                if let Some(name) = intersect_gname {
                    if c.cleaned_against_name.is_empty() {
                        c.cleaned_against_name = name.to_string();
                    }
                }
                colors.push(c);
            }
        }
        Ok(GraphFileHeader::new(kmer_size, colors))
    }
}

/// Inspect a `.ctx` file's header without loading any kmer records.
pub fn probe(path: &Path) -> Result<GraphFileHeader> {
    let mut file = File::open(path)?;
    GraphFileHeader::read(&mut file, &path.display().to_string())
}

/// Controls how [`load`] interprets and filters one input file's
/// records.
#[derive(Debug, Clone, Default)]
pub struct GraphLoadingPrefs {
    /// Clamp every coverage increment to at most 1.
    pub boolean_covgs: bool,
    /// Only load kmers that already exist in the table (used for
    /// intersect-style loads).
    pub must_exist_in_graph: bool,
    /// Only load kmers whose union-of-colors edges in the file are a
    /// superset of this mask.
    pub must_exist_in_edges: Option<Edges>,
    /// Error instead of silently merging when a kmer from the file is
    /// already present in the destination colors.
    pub empty_colours: bool,
}

fn record_passes_filters(
    table: &KmerHashTable,
    prefs: &GraphLoadingPrefs,
    bk: &BinaryKmer,
    edges_union: Edges,
) -> bool {
    if prefs.must_exist_in_graph && table.find(bk).is_none() {
        return false;
    }
    if let Some(required) = prefs.must_exist_in_edges {
        if edges_union.0 & required.0 != required.0 {
            return false;
        }
    }
    true
}

fn read_record<R: Read>(
    r: &mut R,
    header: &GraphFileHeader,
    path: &str,
) -> Result<Option<(BinaryKmer, Vec<u32>, Vec<Edges>)>> {
    let mut words = vec![0u64; header.num_words];
    match r.read_u64_into::<LittleEndian>(&mut words) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut covgs = Vec::with_capacity(header.num_colors());
    let mut edges = Vec::with_capacity(header.num_colors());
    for _ in 0..header.num_colors() {
        covgs.push(r.read_u32::<LittleEndian>().map_err(|_| GraphError::Truncated {
            field: "covg",
            expected: 4,
            got: 0,
            path: path.to_string(),
        })?);
    }
    for _ in 0..header.num_colors() {
        edges.push(Edges(r.read_u8().map_err(|_| GraphError::Truncated {
            field: "edges",
            expected: 1,
            got: 0,
            path: path.to_string(),
        })?));
    }
    let bk = BinaryKmer::from_words(header.kmer_size, words)?;
    Ok(Some((bk, covgs, edges)))
}

fn write_record<W: Write>(w: &mut W, bk: &BinaryKmer, covgs: &[u32], edges: &[Edges]) -> io::Result<()> {
    for &word in bk.words() {
        w.write_u64::<LittleEndian>(word)?;
    }
    for &c in covgs {
        w.write_u32::<LittleEndian>(c)?;
    }
    for &e in edges {
        w.write_u8(e.0)?;
    }
    Ok(())
}

/// Load every kmer record from `path` into `table`/`store`, starting
/// at color `first_color` in the destination. Returns the file's
/// header and updates `stats`.
pub fn load(
    path: &Path,
    prefs: &GraphLoadingPrefs,
    first_color: usize,
    table: &KmerHashTable,
    store: &GraphStore,
    stats: &mut crate::loading_stats::LoadingStats,
) -> Result<GraphFileHeader> {
    let path_str = path.display().to_string();
    let mut file = File::open(path)?;
    let header = GraphFileHeader::read(&mut file, &path_str)?;

    while let Some((bk, covgs, edges)) = read_record(&mut file, &header, &path_str)? {
        let edges_union = edges.iter().fold(Edges::EMPTY, |a, &b| a.merge(b));
        if !record_passes_filters(table, prefs, &bk, edges_union) {
            continue;
        }

        let mut inserted = false;
        let hkey = table.find_or_insert(&bk, &mut inserted)?;
        if prefs.empty_colours && !inserted {
            return Err(GraphError::AlreadyPresent { colour: first_color });
        }

        for (i, (&covg, &e)) in covgs.iter().zip(edges.iter()).enumerate() {
            let color = first_color + i;
            if color >= store.ncols() {
                break;
            }
            if !e.is_empty() {
                store_add_edges(store, hkey, color, e);
            }
            let covg = if prefs.boolean_covgs { covg.min(1) } else { covg };
            store.covg_add(hkey, color, covg);
        }

        stats.num_kmers_parsed += 1;
        if inserted {
            stats.num_kmers_novel += 1;
        }
        stats.num_kmers_loaded += 1;
    }

    Ok(header)
}

fn store_add_edges(store: &GraphStore, hkey: HKey, color: usize, e: Edges) {
    use crate::graph_store::Direction;
    for base in 0..4u8 {
        if e.0 & (1 << base) != 0 {
            store.add_edge(hkey, color, Direction::Incoming, base);
        }
        if e.0 & (1 << (base + 4)) != 0 {
            store.add_edge(hkey, color, Direction::Outgoing, base);
        }
    }
}

/// Merge several `.ctx` files into one output file: combine their
/// headers, load every input's kmers into `table`/`store` (each
/// file's colors landing at consecutive destination colors), then
/// write the merged graph to `out_path`. `intersect_name`, if given, is
/// recorded as every output color's `cleaned_against_name` (see
/// [`GraphFileHeader::merge`]) unless a color already carries one.
pub fn merge(
    out_path: &Path,
    inputs: &[&Path],
    table: &KmerHashTable,
    store: &GraphStore,
    only_load_if_in_edges: Option<Edges>,
    intersect_name: Option<&str>,
) -> Result<u64> {
    let headers: Vec<GraphFileHeader> = inputs.iter().map(|p| probe(p)).collect::<Result<_>>()?;
    let merged_header = GraphFileHeader::merge(&headers, intersect_name)?;

    let mut next_color = 0usize;
    let mut stats = crate::loading_stats::LoadingStats::new();
    for path in inputs {
        let prefs = GraphLoadingPrefs {
            must_exist_in_edges: only_load_if_in_edges,
            ..Default::default()
        };
        let h = load(path, &prefs, next_color, table, store, &mut stats)?;
        next_color += h.num_colors();
    }

    save(out_path, &merged_header, table, store)
}

/// Stream a single input file to `out_path`, keeping only records
/// whose union edges are a superset of `only_load_if_in_edges` (when
/// given) and, if `intersect_table` is given, that already exist in
/// it. Unlike [`merge`]/[`load`], this never materializes the kmers
/// into a `KmerHashTable` — each record is read, filtered, and written
/// straight through.
pub fn stream_filter(
    out_path: &Path,
    in_path: &Path,
    intersect_table: Option<&KmerHashTable>,
    only_load_if_in_edges: Option<Edges>,
) -> Result<u64> {
    let path_str = in_path.display().to_string();
    let mut infile = File::open(in_path)?;
    let header = GraphFileHeader::read(&mut infile, &path_str)?;

    let outfile = File::create(out_path)?;
    let mut w = BufWriter::new(outfile);
    header.write(&mut w)?;

    let mut nkmers = 0u64;
    while let Some((bk, covgs, edges)) = read_record(&mut infile, &header, &path_str)? {
        let edges_union = edges.iter().fold(Edges::EMPTY, |a, &b| a.merge(b));
        if let Some(required) = only_load_if_in_edges {
            if edges_union.0 & required.0 != required.0 {
                continue;
            }
        }
        if let Some(table) = intersect_table {
            if table.find(&bk).is_none() {
                continue;
            }
        }
        write_record(&mut w, &bk, &covgs, &edges)?;
        nkmers += 1;
    }
    w.write_all(MAGIC)?;
    w.flush()?;
    Ok(nkmers)
}

/// Write every occupied kmer in `table`, with `store`'s per-color
/// covg/edges, to `out_path` preceded by `header`. Returns the number
/// of kmers written.
pub fn save(out_path: &Path, header: &GraphFileHeader, table: &KmerHashTable, store: &GraphStore) -> Result<u64> {
    let file = File::create(out_path)?;
    let mut w = BufWriter::new(file);
    header.write(&mut w)?;

    let mut nkmers = 0u64;
    let mut io_err: Option<io::Error> = None;
    table.iterate(|hkey, bk| {
        if io_err.is_some() {
            return;
        }
        let covgs: Vec<u32> = (0..store.ncols()).map(|c| store.covg(hkey, c)).collect();
        let edges: Vec<Edges> = (0..store.ncols()).map(|c| store.edges(hkey, c)).collect();
        if let Err(e) = write_record(&mut w, bk, &covgs, &edges) {
            io_err = Some(e);
        } else {
            nkmers += 1;
        }
    });
    if let Some(e) = io_err {
        return Err(e.into());
    }

    w.write_all(MAGIC)?;
    w.flush()?;
    Ok(nkmers)
}

/// Memory-mapped read-only view of a `.ctx` file, used when a caller
/// wants direct record access without streaming through `load`.
pub struct MappedGraphFile {
    mmap: Mmap,
    header: GraphFileHeader,
}

impl MappedGraphFile {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();
        let file = File::open(path)?;
        let header = {
            let mut f = &file;
            GraphFileHeader::read(&mut f, &path_str)?
        };
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap, header })
    }

    pub fn header(&self) -> &GraphFileHeader {
        &self.header
    }

    /// Number of kmer records following the header.
    pub fn num_records(&self) -> usize {
        let body_len = self.mmap.len().saturating_sub(self.header.encoded_len() + MAGIC.len());
        body_len / self.header.record_len()
    }

    /// Read record `idx` directly out of the mapped region.
    pub fn record(&self, idx: usize) -> Result<(BinaryKmer, Vec<u32>, Vec<Edges>)> {
        let rec_len = self.header.record_len();
        let start = self.header.encoded_len() + idx * rec_len;
        let mut slice = &self.mmap[start..start + rec_len];
        let ncols = self.header.num_colors();

        let mut words = vec![0u64; self.header.num_words];
        slice.read_u64_into::<LittleEndian>(&mut words)?;
        let mut covgs = Vec::with_capacity(ncols);
        for _ in 0..ncols {
            covgs.push(slice.read_u32::<LittleEndian>()?);
        }
        let mut edges = Vec::with_capacity(ncols);
        for _ in 0..ncols {
            edges.push(Edges(slice.read_u8()?));
        }
        let bk = BinaryKmer::from_words(self.header.kmer_size, words)?;
        Ok((bk, covgs, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(kmer_size: usize, ncols: usize) -> GraphFileHeader {
        let colors = (0..ncols).map(|i| ColorInfo::new(format!("sample{i}"))).collect();
        GraphFileHeader::new(kmer_size, colors)
    }

    #[test]
    fn header_roundtrips_through_write_read() {
        let header = sample_header(11, 2);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = GraphFileHeader::read(&mut cursor, "test").unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; 6];
        buf[0] = b'X';
        let mut cursor = std::io::Cursor::new(buf);
        let err = GraphFileHeader::read(&mut cursor, "test").unwrap_err();
        assert!(matches!(err, GraphError::BadMagic { .. }));
    }

    #[test]
    fn merge_concatenates_colors_and_checks_kmer_size() {
        let a = sample_header(21, 1);
        let b = sample_header(21, 2);
        let merged = GraphFileHeader::merge(&[a, b], Some("intersect.ctx")).unwrap();
        assert_eq!(merged.num_colors(), 3);
        assert_eq!(merged.kmer_size, 21);
        assert!(merged.colors.iter().all(|c| c.cleaned_against_name == "intersect.ctx"));

        let mismatched = sample_header(31, 1);
        assert!(GraphFileHeader::merge(&[sample_header(21, 1), mismatched], None).is_err());
    }

    #[test]
    fn save_and_load_roundtrip_preserves_kmers_and_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ctx");

        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);
        for s in ["AAA", "AAC", "TTT"] {
            let bk = BinaryKmer::from_str(s, 3).unwrap();
            let mut inserted = false;
            let hkey = table.find_or_insert(&bk, &mut inserted).unwrap();
            store.covg_add(hkey, 0, 5);
        }

        let header = sample_header(3, 1);
        let written = save(&path, &header, &table, &store).unwrap();
        assert_eq!(written, 3);

        let table2 = KmerHashTable::new(3, 64);
        let store2 = GraphStore::new(table2.capacity(), 1);
        let mut stats = crate::loading_stats::LoadingStats::new();
        let loaded_header = load(&path, &GraphLoadingPrefs::default(), 0, &table2, &store2, &mut stats).unwrap();
        assert_eq!(loaded_header.kmer_size, 3);
        assert_eq!(table2.count_kmers(), 3);
        assert_eq!(stats.num_kmers_loaded, 3);

        let bk = BinaryKmer::from_str("AAA", 3).unwrap();
        let hkey = table2.find(&bk);
        assert!(hkey.is_some());
        assert_eq!(store2.covg(hkey, 0), 5);
    }

    #[test]
    fn probe_reads_header_without_loading_kmers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.ctx");
        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);
        let header = sample_header(3, 2);
        save(&path, &header, &table, &store).unwrap();

        let probed = probe(&path).unwrap();
        assert_eq!(probed.num_colors(), 2);
        assert_eq!(probed.kmer_size, 3);
    }

    #[test]
    fn stream_filter_keeps_only_intersecting_kmers() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("in.ctx");
        let out_path = dir.path().join("out.ctx");

        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);
        let mut keep_hkey = None;
        for s in ["AAA", "AAC"] {
            let bk = BinaryKmer::from_str(s, 3).unwrap();
            let mut inserted = false;
            let hkey = table.find_or_insert(&bk, &mut inserted).unwrap();
            store.covg_add(hkey, 0, 1);
            if s == "AAA" {
                keep_hkey = Some(hkey);
            }
        }
        let header = sample_header(3, 1);
        save(&in_path, &header, &table, &store).unwrap();

        let intersect_table = KmerHashTable::new(3, 64);
        let aaa = BinaryKmer::from_str("AAA", 3).unwrap();
        let mut inserted = false;
        intersect_table.find_or_insert(&aaa, &mut inserted).unwrap();

        let n = stream_filter(&out_path, &in_path, Some(&intersect_table), None).unwrap();
        assert_eq!(n, 1);
        let _ = keep_hkey;

        let probed = probe(&out_path).unwrap();
        assert_eq!(probed.num_colors(), 1);
    }
}
