use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use line_ext_sort::{ExternalSorterBuilder, FileGenerator};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let input = path::PathBuf::from(arg_parser.value_of("input").expect("value has a default"));
    let output: Option<&str> = arg_parser.value_of("output");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let buffer_size: Option<&str> = arg_parser.value_of("buffer_size");

    if let Some(size) = arg_parser.value_of("generate") {
        let size = size.parse::<ByteSize>().expect("value is pre-validated").as_u64();
        let mut generator = FileGenerator::new(size);
        if arg_parser.is_present("seed") {
            generator = generator.with_seed(arg_parser.value_of_t_or_exit("seed"));
        }

        if let Err(err) = generator.generate(&input) {
            log::error!("input file generation error: {}", err);
            process::exit(1);
        }
    }

    let mut sorter_builder = ExternalSorterBuilder::new();
    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(buffer_size) = buffer_size {
        let buffer_size = parse_buffer_size(buffer_size).expect("value is pre-validated");
        sorter_builder = sorter_builder.with_buffer_size(buffer_size);
    }

    let sorter = sorter_builder.build();

    log::info!("sorting started");
    let result = match output {
        Some(output) => sorter
            .sort_file_to(&input, path::Path::new(output))
            .map(|_| path::PathBuf::from(output)),
        None => sorter.sort_file(&input),
    };

    match result {
        Ok(output) => {
            log::info!("sorting finished");
            println!("{}", output.display());
        }
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_size(v: &str) -> Result<(), String> {
    match v.parse::<ByteSize>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn parse_buffer_size(v: &str) -> Result<usize, String> {
    let size = v
        .parse::<ByteSize>()
        .map_err(|err| format!("size format incorrect: {}", err))?;

    usize::try_from(size.as_u64()).map_err(|_| format!("buffer size {} does not fit in memory", size))
}

fn validate_buffer_size(v: &str) -> Result<(), String> {
    parse_buffer_size(v).map(|_| ())
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-ext-sort")
        .about("external sorter for <number>.<text> line files")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted (the generated file with --generate)")
                .takes_value(true)
                .default_value("BigFile.txt"),
        )
        .arg(
            clap::Arg::new("generate")
                .short('g')
                .long("generate")
                .help("generate an input file of the given size first, e.g. 100MB")
                .takes_value(true)
                .validator(validate_size),
        )
        .arg(
            clap::Arg::new("seed")
                .short('s')
                .long("seed")
                .help("random seed of the generated file")
                .takes_value(true)
                .requires("generate"),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file (default: <input stem>Sorted.<extension> next to the input)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data (default: the input directory)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("buffer_size")
                .short('b')
                .long("buffer-size")
                .help("input read buffer size (default: estimated from the input size)")
                .takes_value(true)
                .validator(validate_buffer_size),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::parse_buffer_size;

    #[rstest]
    #[case("8", Some(8))]
    #[case("4KiB", Some(4096))]
    #[case("1MB", Some(1_000_000))]
    #[case("not a size", None)]
    fn test_parse_buffer_size(#[case] value: &str, #[case] expected: Option<usize>) {
        assert_eq!(parse_buffer_size(value).ok(), expected);
    }

    #[test]
    fn test_parse_buffer_size_rejects_values_above_usize() {
        let value = format!("{}", u64::MAX);
        let expected = usize::try_from(u64::MAX).ok();

        assert_eq!(parse_buffer_size(&value).ok(), expected);
    }
}
