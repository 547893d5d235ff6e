use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use comfy_sorter_core::cleanup::{cleanup_directory, CleanupOptions};
use comfy_sorter_core::color::{sort_by_color, ColorSortOptions};
use comfy_sorter_core::flatten::{flatten_images, preview_flatten, FlattenOptions};
use comfy_sorter_core::metadata::{
    extract_loras, extract_primary_checkpoint, extract_prompts, extract_sampling_params,
    grouping_signature, read_text_chunks, MetadataReader,
};
use comfy_sorter_core::search::{search_and_sort, SearchField, SearchMode, SearchOptions};
use comfy_sorter_core::{CheckpointSorter, Config};

#[derive(Parser)]
#[command(name = "comfy-sorter")]
#[command(about = "Sort AI-generated images by their embedded workflow metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort images into folders by checkpoint model
    Sort {
        /// Directory containing the images to sort
        source: PathBuf,

        /// Directory to sort images into
        output: PathBuf,

        /// Copy files instead of moving them
        #[arg(long)]
        copy: bool,

        /// Skip writing metadata text files next to sorted images
        #[arg(long)]
        no_sidecars: bool,

        /// Mirror the source's subfolder structure inside each group
        #[arg(long)]
        preserve_structure: bool,

        /// Track distinct checkpoint + LoRA configurations
        #[arg(long)]
        lora_stack: bool,

        /// Rename sorted files with sequential numbering
        #[arg(long)]
        rename: bool,

        /// Prefix for renamed files
        #[arg(long, default_value = "")]
        prefix: String,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for rotating log files
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Gather images whose metadata matches search terms
    Search {
        /// Directory to search
        source: PathBuf,

        /// Directory to gather matches into
        output: PathBuf,

        /// Terms to search for
        #[arg(required = true)]
        terms: Vec<String>,

        /// Require every term to match instead of any
        #[arg(long)]
        all: bool,

        /// Require every term to appear in the combined metadata text
        #[arg(long, conflicts_with = "all")]
        exact: bool,

        /// Match case-sensitively
        #[arg(long)]
        case_sensitive: bool,

        /// Restrict the search to specific metadata fields
        /// (checkpoints, loras, positive_prompt, negative_prompt,
        /// prompts, sampling_params, full_metadata)
        #[arg(long)]
        fields: Vec<String>,

        /// Move matches instead of copying them
        #[arg(long)]
        move_files: bool,

        /// Create one subfolder per matched term
        #[arg(long)]
        subfolders: bool,
    },

    /// Flatten a nested image tree into a single directory
    Flatten {
        /// Root of the tree to flatten
        directory: PathBuf,

        /// Show what would happen without touching any file
        #[arg(long)]
        preview: bool,

        /// Copy files instead of moving them
        #[arg(long)]
        copy: bool,

        /// Keep subdirectories emptied by the moves
        #[arg(long)]
        keep_empty_dirs: bool,

        /// Rename flattened files with sequential numbering
        #[arg(long)]
        rename: bool,

        /// Prefix for renamed files
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Sort images into folders by dominant color
    Color {
        /// Directory containing the images to sort
        source: PathBuf,

        /// Directory to sort images into
        output: PathBuf,

        /// Move files instead of copying them
        #[arg(long)]
        move_files: bool,

        /// Skip pixels darker than this brightness fraction
        #[arg(long, default_value_t = 0.1)]
        dark_threshold: f32,

        /// Rename sorted files as {category}_img{n}
        #[arg(long)]
        rename: bool,

        /// Prefix for renamed files
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Clean sorting artifacts out of a directory's filenames
    Cleanup {
        /// Directory to clean up
        directory: PathBuf,

        /// Keep the sidecar metadata text files
        #[arg(long)]
        keep_sidecars: bool,

        /// Leave filenames untouched
        #[arg(long)]
        no_rename: bool,

        /// Fallback name for files whose cleaned name comes out empty
        #[arg(long, default_value = "image")]
        prefix: String,

        /// Show what would happen without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the embedded workflow metadata of one image
    Inspect {
        /// PNG file to inspect
        file: PathBuf,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "comfy-sorter.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sort {
            source,
            output,
            copy,
            no_sidecars,
            preserve_structure,
            lora_stack,
            rename,
            prefix,
            config,
            log_dir,
        } => {
            let mut config = if let Some(config_path) = config {
                Config::from_file(&config_path)?
            } else {
                Config::default()
            };

            // Override config with command line arguments
            config.move_files = !copy;
            config.write_sidecars = !no_sidecars;
            config.preserve_structure = preserve_structure;
            config.group_by_lora_stack = lora_stack;
            config.rename_files = rename;
            if !prefix.is_empty() {
                config.user_prefix = prefix;
            }
            if log_dir.is_some() {
                config.log_dir = log_dir;
            }

            if let Some(dir) = &config.log_dir {
                comfy_sorter_core::logging::init_logger(dir)
                    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;
            }

            let sorter = CheckpointSorter::new(config)?;

            info!("Starting checkpoint sorting...");
            let summary = sorter.sort_by_checkpoint(&source, &output)?;

            println!("\n=== SORTING SUMMARY ===");
            println!("Total images found: {}", summary.report.total_images);
            println!("Successfully sorted: {}", summary.report.sorted_images);
            println!("Unknown checkpoint: {}", summary.report.unknown_checkpoint);
            println!("No metadata: {}", summary.report.extraction_failed);
            println!("Folders created: {}", summary.report.folders_created);
            println!("Duplicates renamed: {}", summary.report.duplicates_handled);
            println!("Failed operations: {}", summary.report.failed_operations);
            println!(
                "Extraction success rate: {:.1}%",
                summary.extraction.success_rate()
            );
            if summary.distinct_signatures > 0 {
                println!(
                    "Distinct model configurations: {}",
                    summary.distinct_signatures
                );
            }
            for (path, reason) in &summary.extraction.failed_files {
                println!("  FAILED {}: {}", path.display(), reason);
            }

            Ok(())
        }

        Commands::Search {
            source,
            output,
            terms,
            all,
            exact,
            case_sensitive,
            fields,
            move_files,
            subfolders,
        } => {
            let fields = if fields.is_empty() {
                None
            } else {
                let parsed = fields
                    .iter()
                    .map(|name| {
                        SearchField::parse(name)
                            .ok_or_else(|| anyhow::anyhow!("unknown search field '{}'", name))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(parsed)
            };

            let mode = if exact {
                SearchMode::Exact
            } else if all {
                SearchMode::All
            } else {
                SearchMode::Any
            };

            let options = SearchOptions {
                mode,
                case_sensitive,
                fields,
                move_files,
                create_subfolders: subfolders,
            };

            let report = search_and_sort(&source, &output, &terms, &options)?;

            println!("\n=== SEARCH SUMMARY ===");
            println!("Files scanned: {}", report.total_scanned);
            println!("Matches: {}", report.matched);
            println!("Without metadata: {}", report.no_metadata);
            println!("Failed operations: {}", report.failed_operations);

            Ok(())
        }

        Commands::Flatten {
            directory,
            preview,
            copy,
            keep_empty_dirs,
            rename,
            prefix,
        } => {
            if preview {
                let preview = preview_flatten(&directory)?;
                println!("\n=== FLATTEN PREVIEW ===");
                println!("Nested images: {}", preview.total_images);
                for (folder, count) in &preview.images_per_folder {
                    println!("  {}: {} images", folder.display(), count);
                }
                if !preview.conflicting_names.is_empty() {
                    println!("Conflicting filenames:");
                    for name in &preview.conflicting_names {
                        println!("  {}", name);
                    }
                }
                return Ok(());
            }

            let options = FlattenOptions {
                move_files: !copy,
                remove_empty_dirs: !keep_empty_dirs,
                rename_files: rename,
                user_prefix: prefix,
            };
            let report = flatten_images(&directory, &options)?;

            println!("\n=== FLATTEN SUMMARY ===");
            println!("Nested images: {}", report.total_images);
            println!("Processed: {}", report.processed);
            println!("Failed: {}", report.failed);
            println!("Duplicates renamed: {}", report.duplicates_renamed);
            println!("Empty folders removed: {}", report.empty_dirs_removed);

            Ok(())
        }

        Commands::Color {
            source,
            output,
            move_files,
            dark_threshold,
            rename,
            prefix,
        } => {
            let options = ColorSortOptions {
                move_files,
                dark_threshold,
                rename_files: rename,
                user_prefix: prefix,
            };
            let report = sort_by_color(&source, &output, &options)?;

            println!("\n=== COLOR SORTING SUMMARY ===");
            println!("Total images found: {}", report.total_images);
            println!("Successfully sorted: {}", report.sorted);
            println!("Failed: {}", report.failed);
            println!("\n=== COLOR DISTRIBUTION ===");
            for (color, count) in &report.distribution {
                println!("  {}: {} images", color, count);
            }

            Ok(())
        }

        Commands::Cleanup {
            directory,
            keep_sidecars,
            no_rename,
            prefix,
            dry_run,
        } => {
            let options = CleanupOptions {
                remove_sidecars: !keep_sidecars,
                rename_files: !no_rename,
                filename_prefix: prefix,
                dry_run,
            };
            let report = cleanup_directory(&directory, &options)?;

            if dry_run {
                println!("\n=== CLEANUP PREVIEW ===");
                for (path, new_name) in &report.renames {
                    println!("  RENAME {} -> {}", path.display(), new_name);
                }
                for path in &report.removals {
                    println!("  REMOVE {}", path.display());
                }
            }

            println!("\n=== CLEANUP SUMMARY ===");
            println!("Total files: {}", report.total_files);
            println!("Files renamed: {}", report.files_renamed);
            println!("Sidecar files removed: {}", report.sidecars_removed);
            println!("Failed operations: {}", report.failed);

            Ok(())
        }

        Commands::Inspect { file } => {
            let chunks = read_text_chunks(&file)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;

            println!("=== TEXT CHUNKS ===");
            for (keyword, text) in &chunks {
                println!("{}: {} bytes", keyword, text.len());
            }

            let mut reader = MetadataReader::new();
            let Some(graph) = reader.extract(&file) else {
                println!("\nNo workflow metadata found");
                return Ok(());
            };

            println!("\n=== WORKFLOW ===");
            println!("Nodes: {}", graph.len());
            println!(
                "Primary checkpoint: {}",
                extract_primary_checkpoint(&graph).unwrap_or_else(|| "unknown".to_string())
            );
            println!("Grouping signature: {}", grouping_signature(&graph));

            let loras = extract_loras(&graph);
            if !loras.is_empty() {
                println!("LoRAs: {}", loras.join(", "));
            }

            let params = extract_sampling_params(&graph);
            if !params.is_empty() {
                if let Some(steps) = params.steps {
                    println!("Steps: {}", steps);
                }
                if let Some(cfg) = params.cfg {
                    println!("Cfg: {}", cfg);
                }
                if let Some(sampler) = &params.sampler_name {
                    println!("Sampler: {}", sampler);
                }
                if let Some(scheduler) = &params.scheduler {
                    println!("Scheduler: {}", scheduler);
                }
            }

            let prompts = extract_prompts(&graph);
            if !prompts.positive.is_empty() {
                println!("\nPositive prompt:\n{}", prompts.positive);
            }
            if !prompts.negative.is_empty() {
                println!("\nNegative prompt:\n{}", prompts.negative);
            }

            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
