// Clippy allows
#![allow(clippy::too_many_arguments)]

//! cortex-graph: colored de Bruijn graph engine CLI.
//!
//! Usage: cortex-graph <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use cortex_graph::bitset::AtomicBitset;
use cortex_graph::clean::CleanEngine;
use cortex_graph::graph_store::{Edges, GraphStore};
use cortex_graph::graphfile::{self, ColorInfo, GraphFileHeader, GraphLoadingPrefs};
use cortex_graph::hashtable::KmerHashTable;
use cortex_graph::io_util::file_size;
use cortex_graph::loading_stats::LoadingStats;
use cortex_graph::{die, status, GraphError, Result};

#[derive(Parser)]
#[command(name = "cortex-graph")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "Colored de Bruijn graph engine: build, clean and inspect .ctx graph files", long_about = None)]
struct Cli {
    /// Number of worker threads to use (default: available parallelism)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flat-load one or more .ctx files into a single color and save
    Build {
        /// Input .ctx files to load
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output .ctx path
        #[arg(short, long)]
        output: PathBuf,

        /// Sample name recorded in the output header's single color
        #[arg(long, default_value = "sample")]
        sample_name: String,
    },

    /// Remove low-coverage supernodes and short tips
    Clean {
        /// Input .ctx file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .ctx path for the cleaned graph
        #[arg(short, long)]
        output: PathBuf,

        /// Minimum mean supernode coverage to keep; 0 disables
        /// coverage-based cleaning
        #[arg(long, default_value = "0")]
        covg_threshold: u32,

        /// Minimum tip length (in nodes) to keep; 0 disables tip
        /// clipping
        #[arg(long, default_value = "0")]
        min_keep_tip: usize,

        /// Estimate the coverage threshold from the kmer coverage
        /// histogram instead of taking --covg-threshold literally
        #[arg(long)]
        auto_threshold: bool,

        /// False-discovery-rate limit for --auto-threshold
        #[arg(long, default_value = "0.001")]
        fdr_limit: f64,

        /// Write the before/after coverage histogram CSV here
        #[arg(long)]
        covg_hist_out: Option<PathBuf>,

        /// Write the before/after length histogram CSV here
        #[arg(long)]
        len_hist_out: Option<PathBuf>,
    },

    /// Merge several .ctx files into one multi-color .ctx file
    Merge {
        /// Input .ctx files, each contributing its own colors
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output .ctx path
        #[arg(short, long)]
        output: PathBuf,

        /// Only keep kmers whose union edges are a superset of this
        /// hex edge byte (e.g. 0x0F for "any incoming edge")
        #[arg(long)]
        only_if_edges: Option<String>,

        /// Record this name as every output color's
        /// `cleaned_against_name`, unless a color already carries one
        #[arg(long)]
        intersect_name: Option<String>,
    },

    /// Stream-copy one .ctx file, filtering records without loading
    /// them into memory
    StreamFilter {
        /// Input .ctx file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .ctx path
        #[arg(short, long)]
        output: PathBuf,

        /// Only keep kmers already present in this .ctx file's table
        #[arg(long)]
        intersect_with: Option<PathBuf>,

        /// Only keep kmers whose union edges are a superset of this
        /// hex edge byte
        #[arg(long)]
        only_if_edges: Option<String>,
    },

    /// Print a .ctx file's header without loading its kmers
    Probe {
        /// Input .ctx file
        input: PathBuf,
    },

    /// Load a .ctx file and print every kmer with its per-color
    /// coverage and edges
    Dump {
        /// Input .ctx file
        input: PathBuf,
    },
}

fn configure_threads(threads: Option<usize>) {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("failed to initialize global thread pool");
    }
}

fn resolved_threads(threads: Option<usize>) -> usize {
    threads.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
}

fn parse_edge_byte(s: &str) -> Result<Edges> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    let byte = u8::from_str_radix(s, 16).map_err(|_| GraphError::InvalidKmer(format!("not a hex byte: {s}")))?;
    Ok(Edges(byte))
}

/// Probe `paths`' headers, check they all agree on kmer size, and
/// return an approximate total kmer count (used to size a fresh
/// table) derived from each file's size divided by its record length.
fn capacity_hint(paths: &[PathBuf]) -> Result<(usize, Vec<GraphFileHeader>)> {
    let headers: Vec<GraphFileHeader> = paths
        .iter()
        .map(|p| graphfile::probe(p))
        .collect::<Result<_>>()?;

    let kmer_size = headers[0].kmer_size;
    if headers.iter().any(|h| h.kmer_size != kmer_size) {
        die!("input files disagree on kmer size");
    }

    let mut total = 0usize;
    for (path, header) in paths.iter().zip(&headers) {
        let size = file_size(path).unwrap_or(0) as usize;
        let body = size.saturating_sub(header.encoded_len() + graphfile::MAGIC.len());
        total += body / header.record_len().max(1);
    }
    Ok((total.max(1), headers))
}

fn run_build(inputs: Vec<PathBuf>, output: PathBuf, sample_name: String) -> Result<()> {
    let (capacity, headers) = capacity_hint(&inputs)?;
    let kmer_size = headers[0].kmer_size;

    let table = KmerHashTable::new(kmer_size, capacity);
    let store = GraphStore::new(table.capacity(), 1);

    let mut stats = LoadingStats::new();
    for path in &inputs {
        graphfile::load(path, &GraphLoadingPrefs::default(), 0, &table, &store, &mut stats)?;
    }
    stats.print_summary(table.count_kmers());

    let header = GraphFileHeader::new(kmer_size, vec![ColorInfo::new(sample_name)]);
    let nkmers = graphfile::save(&output, &header, &table, &store)?;
    status!("wrote {} kmers to {}", nkmers, output.display());
    Ok(())
}

fn run_merge(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    only_if_edges: Option<String>,
    intersect_name: Option<String>,
) -> Result<()> {
    let only_if_edges = only_if_edges.as_deref().map(parse_edge_byte).transpose()?;
    let (capacity, headers) = capacity_hint(&inputs)?;
    let kmer_size = headers[0].kmer_size;
    let total_cols: usize = headers.iter().map(|h| h.num_colors()).sum();

    let table = KmerHashTable::new(kmer_size, capacity);
    let store = GraphStore::new(table.capacity(), total_cols.max(1));

    let input_refs: Vec<&Path> = inputs.iter().map(|p| p.as_path()).collect();
    let nkmers = graphfile::merge(&output, &input_refs, &table, &store, only_if_edges, intersect_name.as_deref())?;
    status!("merged {} files into {} ({} kmers)", inputs.len(), output.display(), nkmers);
    Ok(())
}

fn run_stream_filter(
    input: PathBuf,
    output: PathBuf,
    intersect_with: Option<PathBuf>,
    only_if_edges: Option<String>,
) -> Result<()> {
    let only_if_edges = only_if_edges.as_deref().map(parse_edge_byte).transpose()?;

    let intersect_table = match &intersect_with {
        Some(path) => {
            let (capacity, _headers) = capacity_hint(std::slice::from_ref(path))?;
            let header = graphfile::probe(path)?;
            let table = KmerHashTable::new(header.kmer_size, capacity);
            let store = GraphStore::new(table.capacity(), header.num_colors().max(1));
            let mut stats = LoadingStats::new();
            graphfile::load(path, &GraphLoadingPrefs::default(), 0, &table, &store, &mut stats)?;
            Some(table)
        }
        None => None,
    };

    let nkmers = graphfile::stream_filter(&output, &input, intersect_table.as_ref(), only_if_edges)?;
    status!("wrote {} filtered kmers to {}", nkmers, output.display());
    Ok(())
}

fn run_probe(input: PathBuf) -> Result<()> {
    let header = graphfile::probe(&input)?;
    println!("kmer_size: {}", header.kmer_size);
    println!("word_count_per_kmer: {}", header.num_words);
    println!("num_colors: {}", header.num_colors());
    for (i, c) in header.colors.iter().enumerate() {
        println!(
            "color[{i}]: sample={} mean_read_length={} total_sequence={} cleaned={} (covg_thresh={} tip_thresh={})",
            c.sample_name,
            c.mean_read_length,
            c.total_sequence,
            c.is_graph_cleaned,
            c.low_covg_kmer_thresh,
            c.low_covg_supernodes_thresh,
        );
    }
    Ok(())
}

fn run_dump(input: PathBuf, threads: usize) -> Result<()> {
    let header = graphfile::probe(&input)?;
    let (capacity, _) = capacity_hint(std::slice::from_ref(&input))?;
    let table = KmerHashTable::new(header.kmer_size, capacity);
    let store = GraphStore::new(table.capacity(), header.num_colors().max(1));

    let mut stats = LoadingStats::new();
    graphfile::load(&input, &GraphLoadingPrefs::default(), 0, &table, &store, &mut stats)?;

    let _ = threads;
    table.iterate(|hkey, bk| {
        let covgs: Vec<String> = (0..store.ncols()).map(|c| store.covg(hkey, c).to_string()).collect();
        let edges: Vec<String> = (0..store.ncols()).map(|c| format!("{:#04x}", store.edges(hkey, c).0)).collect();
        println!("{}\tcovg=[{}]\tedges=[{}]", bk.to_string_lossy(), covgs.join(","), edges.join(","));
    });
    Ok(())
}

fn run_clean(
    input: PathBuf,
    output: PathBuf,
    mut covg_threshold: u32,
    min_keep_tip: usize,
    auto_threshold: bool,
    fdr_limit: f64,
    covg_hist_out: Option<PathBuf>,
    len_hist_out: Option<PathBuf>,
    threads: usize,
) -> Result<()> {
    let header = graphfile::probe(&input)?;
    let (capacity, _) = capacity_hint(std::slice::from_ref(&input))?;
    let table = KmerHashTable::new(header.kmer_size, capacity);
    let store = GraphStore::new(table.capacity(), header.num_colors().max(1));

    let mut stats = LoadingStats::new();
    graphfile::load(&input, &GraphLoadingPrefs::default(), 0, &table, &store, &mut stats)?;
    stats.print_summary(table.count_kmers());

    if auto_threshold {
        let engine = CleanEngine::new(&table, &store);
        let visited = AtomicBitset::new(table.capacity());
        let hist = engine.supernode_histograms(threads, &visited);
        let (threshold, alpha, beta, limit) = cortex_graph::clean::pick_kmer_threshold(&hist.covg_hist, fdr_limit)
            .0
            .map(|t| (Some(t), 0.0, 0.0, fdr_limit))
            .unwrap_or_else(|| cortex_graph::clean::estimate_kmer_threshold(&hist.covg_hist));
        match threshold {
            Some(t) => {
                status!("auto threshold: covg >= {} (alpha={:.3} beta={:.3} fdr_limit={})", t, alpha, beta, limit);
                covg_threshold = t as u32;
            }
            None => {
                status!("auto threshold: no cutoff satisfied any fdr limit tried, falling back to --covg-threshold");
            }
        }
    }

    let engine = CleanEngine::new(&table, &store);
    let visited = AtomicBitset::new(table.capacity());
    let keep = AtomicBitset::new(table.capacity());
    let report = engine.clean(threads, covg_threshold, min_keep_tip, &visited, &keep);

    match report {
        None => status!("nothing to clean"),
        Some(report) => {
            status!(
                "removed {} tips, {} low-coverage supernodes, {} tip+low supernodes",
                report.counts.num_tips,
                report.counts.num_low_covg_snodes,
                report.counts.num_tip_and_low_snodes,
            );
            if let Some(path) = covg_hist_out {
                let file = std::fs::File::create(&path)?;
                let mut w = std::io::BufWriter::new(file);
                cortex_graph::clean::write_covg_histogram(&mut w, &report.after.covg_hist, &report.after.mean_covg_hist)?;
            }
            if let Some(path) = len_hist_out {
                let file = std::fs::File::create(&path)?;
                let mut w = std::io::BufWriter::new(file);
                cortex_graph::clean::write_len_histogram(&mut w, &report.after.len_hist, header.kmer_size)?;
            }
        }
    }

    let nkmers = graphfile::save(&output, &header, &table, &store)?;
    status!("wrote {} kmers to {}", nkmers, output.display());
    Ok(())
}

fn main() {
    cortex_graph::diagnostics::init();
    let cli = Cli::parse();
    configure_threads(cli.threads);
    let threads = resolved_threads(cli.threads);

    let result = match cli.command {
        Commands::Build { inputs, output, sample_name } => run_build(inputs, output, sample_name),
        Commands::Clean {
            input,
            output,
            covg_threshold,
            min_keep_tip,
            auto_threshold,
            fdr_limit,
            covg_hist_out,
            len_hist_out,
        } => run_clean(input, output, covg_threshold, min_keep_tip, auto_threshold, fdr_limit, covg_hist_out, len_hist_out, threads),
        Commands::Merge { inputs, output, only_if_edges, intersect_name } => run_merge(inputs, output, only_if_edges, intersect_name),
        Commands::StreamFilter { input, output, intersect_with, only_if_edges } => {
            run_stream_filter(input, output, intersect_with, only_if_edges)
        }
        Commands::Probe { input } => run_probe(input),
        Commands::Dump { input } => run_dump(input, threads),
    };

    if let Err(e) = result {
        die!("{}", e);
    }
    let _ = process::exit;
}
