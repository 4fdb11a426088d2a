use crate::calling::{CoreSnpParams, GroupingPolicy, LinkageCallParams, WindowCallParams};
use crate::cli::ImputeArgs;
use crate::data::{FamilyContext, GenotypeMatrix};
use crate::hmm::HmmParams;
use crate::io::{read_matrix, write_matrix};
use crate::pipeline::{impute_family, PipelineParams};
use crate::sites::SiteFilterParams;
use crate::utils::Result;
use crossbeam_channel::{bounded, Sender};
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::thread;

const CHANNEL_BUFFER_SIZE: usize = 64;

/// Streams the chromosomes of one family through a worker pool and writes
/// the rewritten matrix in input order. Each chromosome is processed by a
/// single worker, so the per-chromosome engine stays deterministic.
pub fn impute(args: ImputeArgs) -> Result<()> {
    let matrices = read_matrix(&args.input)?;
    let num_chroms = matrices.len();
    log::info!(
        "Read {} taxa over {} chromosomes from {}",
        matrices[0].num_taxa(),
        num_chroms,
        args.input.display()
    );
    for matrix in &matrices {
        for parent in [&args.parent_a, &args.parent_c] {
            if matrix.taxon_index(parent).is_none() {
                log::warn!("Founder {} is not a taxon of chromosome {}", parent, matrix.chrom());
            }
        }
    }

    let family = FamilyContext {
        name: args.family.clone(),
        parent_a: args.parent_a.clone(),
        parent_c: args.parent_c.clone(),
    };
    let params = pipeline_params(&args);

    let (sender_work, receiver_work) = bounded(CHANNEL_BUFFER_SIZE);
    let producer_thread = thread::spawn(move || {
        for work in matrices.into_iter().enumerate() {
            if sender_work.send(work).is_err() {
                break;
            }
        }
    });

    let (sender_result, receiver_result) = bounded::<(usize, GenotypeMatrix)>(CHANNEL_BUFFER_SIZE);
    let output_path = args.output.clone();
    let writer_thread = thread::spawn(move || -> Result<()> {
        let mut results: Vec<Option<GenotypeMatrix>> = (0..num_chroms).map(|_| None).collect();
        for (index, matrix) in &receiver_result {
            results[index] = Some(matrix);
        }
        let ordered: Vec<GenotypeMatrix> = results.into_iter().flatten().collect();
        write_matrix(&output_path, &ordered)
    });

    log::debug!("Initializing thread pool with {} threads", args.num_threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .thread_name(|i| format!("parhap-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))?;
    pool.install(|| {
        receiver_work
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |sender, (index, matrix)| {
                process_chromosome(index, matrix, &family, &params, sender);
            });
    });

    drop(sender_result);
    writer_thread.join().expect("Writer thread panicked")?;
    producer_thread.join().expect("Producer thread panicked");
    log::info!("Wrote {}", args.output.display());
    Ok(())
}

fn process_chromosome(
    index: usize,
    matrix: GenotypeMatrix,
    family: &FamilyContext,
    params: &PipelineParams,
    sender: &Sender<(usize, GenotypeMatrix)>,
) {
    match impute_family(&matrix, family, params) {
        Ok(result) => {
            if let Err(e) = sender.send((index, result.matrix)) {
                log::error!("Failed to send chromosome result to writer thread: {}", e);
            }
        }
        Err(err) => log::error!("Chromosome {}: {}", matrix.chrom(), err),
    }
}

fn pipeline_params(args: &ImputeArgs) -> PipelineParams {
    let filter = SiteFilterParams {
        min_minor_count: args.min_minor_count,
        min_minor_frequency: args.min_maf,
        max_missing: args.max_missing,
    };
    let grouping = GroupingPolicy {
        min_minor_size: args.min_minor_group,
        ..GroupingPolicy::default()
    };
    PipelineParams {
        mode: args.mode,
        filter,
        linkage: LinkageCallParams {
            core: CoreSnpParams {
                window_size: args.window_size,
                num_trials: args.core_trials,
                cut_height: args.cut_height,
            },
            grouping,
            min_r: args.min_linkage,
            extension_window: args.extension_window,
        },
        window: WindowCallParams {
            window_size: args.window_size,
            ..WindowCallParams::default()
        },
        hmm: HmmParams {
            het_prob: args.het_prob,
            ..HmmParams::default()
        },
    }
}
