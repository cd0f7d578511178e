use anyhow::{Context, Result, bail};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dialoguer::Confirm;
use indoc::indoc;
use log::Level;

use forum_events::archive_output::{write_event_archive, write_event_tree};
use forum_events::err::EventLogError;
use forum_events::{EventFilter, EventLogParser, ParserSettings, SchemaTable, SerializedEvent};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventOutputFormat {
    Json,
    JsonLines,
    Tar,
}

enum Input {
    Stdin,
    File(PathBuf),
}

enum Output {
    Stream(Box<dyn Write>),
    Archive(Box<dyn Write>),
    Tree(PathBuf),
}

struct ForumEventsDump {
    parser_settings: ParserSettings,
    input: Input,
    show_record_number: bool,
    output: Output,
    verbosity_level: Option<Level>,
}

impl ForumEventsDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = match matches
            .get_one::<String>("INPUT")
            .expect("This is a required argument")
            .as_str()
        {
            "-" => Input::Stdin,
            path => Input::File(PathBuf::from(path)),
        };

        let output_target = matches.get_one::<PathBuf>("output-target");
        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("json")
        {
            "jsonl" => EventOutputFormat::JsonLines,
            "tar" => EventOutputFormat::Tar,
            // A `.tar` output file implies `-o tar`, unless a format was asked for.
            _ if matches.value_source("output-format") != Some(ValueSource::CommandLine)
                && output_target.is_some_and(|p| has_tar_extension(p)) =>
            {
                EventOutputFormat::Tar
            }
            _ => EventOutputFormat::Json,
        };

        let no_indent = match (matches.get_flag("no-indent"), output_format) {
            // "jsonl" --> --no-indent
            (true, EventOutputFormat::JsonLines) => {
                eprintln!("no need to pass both `--no-indent` and `-o jsonl`");
                true
            }
            (v, fmt) => v || fmt == EventOutputFormat::JsonLines,
        };

        let no_show_record_number = match (
            matches.get_flag("no-show-record-number"),
            output_format,
        ) {
            // "jsonl" --> --dont-show-record-number
            (true, EventOutputFormat::JsonLines) => {
                eprintln!("no need to pass both `--dont-show-record-number` and `-o jsonl`");
                true
            }
            (v, fmt) => v || fmt == EventOutputFormat::JsonLines,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let schema = match matches.get_one::<PathBuf>("schema") {
            Some(path) => Arc::new(
                SchemaTable::from_path(path)
                    .with_context(|| format!("Failed to load schema table {}", path.display()))?,
            ),
            None => SchemaTable::forum_default(),
        };

        let filter = matches
            .get_many::<u32>("event-types")
            .map(|types| EventFilter::new(types.copied()))
            .unwrap_or_default();

        if output_format == EventOutputFormat::Tar && matches.contains_id("output-dir") {
            bail!("`-o tar` cannot be combined with `--output-dir`");
        }

        let output = match (output_target, matches.get_one::<PathBuf>("output-dir")) {
            (Some(path), _) => {
                let file = Self::create_output_file(
                    path,
                    !matches.get_flag("no-confirm-overwrite"),
                )
                .with_context(|| {
                    format!(
                        "An error occurred while creating output file at `{}`",
                        path.display()
                    )
                })?;
                let out: Box<dyn Write> = Box::new(BufWriter::new(file));
                match output_format {
                    EventOutputFormat::Tar => Output::Archive(out),
                    _ => Output::Stream(out),
                }
            }
            (None, Some(dir)) => Output::Tree(dir.clone()),
            (None, None) => {
                let out: Box<dyn Write> = Box::new(BufWriter::new(io::stdout()));
                match output_format {
                    EventOutputFormat::Tar => Output::Archive(out),
                    _ => Output::Stream(out),
                }
            }
        };

        Ok(ForumEventsDump {
            parser_settings: ParserSettings::new()
                .validate_checksums(!matches.get_flag("no-checksums"))
                .strict_record_length(matches.get_flag("strict-length"))
                .indent(!no_indent)
                .schema(schema)
                .filter(filter),
            input,
            show_record_number: !no_show_record_number,
            output,
            verbosity_level,
        })
    }

    /// Main entry point for `ForumEventsDump`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let parser = match &self.input {
            Input::Stdin => EventLogParser::from_read(io::stdin().lock())
                .context("Failed to read log from stdin")?,
            Input::File(path) => EventLogParser::from_path(path)?,
        }
        .with_configuration(self.parser_settings.clone());

        if let Output::Tree(dir) = &self.output {
            let written = write_event_tree(dir, parser.events())?;
            eprintln!("Wrote {} events to {}", written, dir.display());
            return Ok(());
        }

        if let Output::Archive(out) = &mut self.output {
            let written = write_event_archive(out, parser.events())?;
            eprintln!("Wrote {} events to archive", written);
            return Ok(());
        }

        for event in parser.events_json() {
            self.dump_event(event)?;
        }
        if let Output::Stream(out) = &mut self.output {
            out.flush()?;
        }

        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() && prompt {
            match Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    p.display()
                ))
                .default(false)
                .interact()
            {
                Ok(true) => {}
                Ok(false) => bail!("Cancelled"),
                Err(e) => bail!(
                    "Failed to write confirmation prompt to term caused by\n{}",
                    e
                ),
            }
        }

        // Ok to assume p is not an existing directory
        match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent)?
            }
            Some(_) => {}
            None => bail!("Output file cannot be root."),
        }

        Ok(File::create(p)?)
    }

    fn dump_event(
        &mut self,
        event: std::result::Result<SerializedEvent<String>, EventLogError>,
    ) -> Result<()> {
        let event = event?;
        let Output::Stream(out) = &mut self.output else {
            return Ok(());
        };

        if self.show_record_number {
            writeln!(out, "Record {}", event.index)?;
        }
        writeln!(out, "{}", event.data)?;
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = simplelog::WriteLogger::init(
                level.to_level_filter(),
                simplelog::Config::default(),
                io::stderr(),
            ) {
                eprintln!("Failed to initialize logging: {:?}", e)
            };
        }
    }
}

fn has_tar_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tar"))
}

fn cli() -> Command {
    Command::new("Forum events dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to decode Fast Forum persisted event logs")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Path to the event log, or `-` to read it from stdin"),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["json", "jsonl", "tar"])
                .default_value("json")
                .help("Sets the output format")
                .long_help(indoc!(
                    r#"Sets the output format:
                        "json"  - prints one indented JSON document per event.
                        "jsonl" - same as json with --no-indent --dont-show-record-number
                        "tar"   - a tar archive with one indented JSON entry per event, named
                                  `NNNN/NNNNNNNN.e<type>` and dated with the event timestamp.
                                  Implied when the output file ends with `.tar`.
                "#
                )),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .help(indoc!("Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                       Will create parent directories if needed.")),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .conflicts_with("output-target")
                .help("Writes every event to its own file under the given directory, as `NNNN/NNNNNNNN.e<type>`."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .help("Decodes events using the JSON schema table at the given path instead of the built-in one."),
        )
        .arg(
            Arg::new("event-types")
                .long("event-types")
                .action(ArgAction::Set)
                .value_delimiter(',')
                .value_parser(value_parser!(u32))
                .help("Comma separated event type codes, only matching events are printed."),
        )
        .arg(
            Arg::new("no-checksums")
                .long("no-checksums")
                .action(ArgAction::SetTrue)
                .help("When set, record checksums are not verified. \
                Useful to inspect damaged logs, decoding errors may be reported instead."),
        )
        .arg(
            Arg::new("strict-length")
                .long("strict-length")
                .action(ArgAction::SetTrue)
                .help("When set, records with bytes left over after the event payload are rejected."),
        )
        .arg(
            Arg::new("no-indent")
                .long("no-indent")
                .action(ArgAction::SetTrue)
                .help("When set, output will not be indented."),
        )
        .arg(
            Arg::new("no-show-record-number")
                .long("dont-show-record-number")
                .action(ArgAction::SetTrue)
                .help("When set, `Record <id>` will not be printed."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!("Sets debug prints level for the application:
                    -v   - info
                    -vv  - debug
                    -vvv - trace
                    NOTE: trace output is only available in debug builds, as it is extremely verbose.")),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut app = ForumEventsDump::from_cli_matches(&matches)?;
    app.run()
}
