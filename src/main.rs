use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use voc2yolo::config::{ClassesArgs, ConvertArgs, SplitArgs};
use voc2yolo::{
    convert_directory, find_all_classes, split_and_copy_dataset, write_class_list, Args,
    ClassRegistry, Command, ConvertParams, DatasetError, MaterializeParams, SplitParams,
    SplitRatios,
};

fn run_convert(args: &ConvertArgs) -> Result<(), DatasetError> {
    info!("Starting the conversion process...");
    let registry = ClassRegistry::load(&args.classes)?;
    let params = ConvertParams {
        image_dir: &args.image_dir,
        labels_dir: &args.output_dir,
        registry: &registry,
        size_source: args.size_from,
    };
    let summary = convert_directory(&args.xml_dir, &params, args.workers)?;
    summary.print_summary();
    info!("Conversion process completed successfully.");
    Ok(())
}

fn run_split(args: &SplitArgs) -> Result<(), DatasetError> {
    info!("Starting the split process...");
    let registry = args
        .classes
        .as_deref()
        .map(ClassRegistry::load)
        .transpose()?;
    let params = SplitParams {
        files: MaterializeParams {
            src_image_dir: &args.image_dir,
            src_label_dir: &args.label_dir,
            image_ext: &args.image_ext,
            label_ext: &args.label_ext,
        },
        output_root: &args.output_dir,
        ratios: SplitRatios::new(args.train_ratio, args.valid_ratio, args.test_ratio)?,
        seed: args.seed,
        registry: registry.as_ref(),
    };
    let summary = split_and_copy_dataset(&params)?;
    summary.print_summary();
    info!("Split process completed successfully.");
    Ok(())
}

fn run_classes(args: &ClassesArgs) -> Result<(), DatasetError> {
    let stats = find_all_classes(&args.xml_dir, args.workers)?;
    stats.print_summary();
    if let Some(output) = &args.output {
        let path = write_class_list(&stats, output)?;
        info!("Wrote suggested class list to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Convert(convert) => run_convert(convert),
        Command::Split(split) => run_split(split),
        Command::Classes(classes) => run_classes(classes),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
