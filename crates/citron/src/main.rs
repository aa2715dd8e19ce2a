use anyhow::Context as _;
use citron::codegen::Codegen;
use citron::grammar::Grammar;
use citron::report::{Report, ReportOptions};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{fs, time::Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print only the basis in the report.
    #[arg(short = 'b')]
    basis_only: bool,

    /// Don't compress the action table.
    #[arg(short = 'c')]
    no_compress: bool,

    /// Output directory. Default is the grammar file's directory.
    #[arg(short = 'd', value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Define an %ifdef macro.
    #[arg(short = 'D', value_name = "NAME")]
    define: Vec<String>,

    /// Print the input file after preprocessing.
    #[arg(short = 'E')]
    print_preprocessed: bool,

    /// Print the grammar without actions.
    #[arg(short = 'g')]
    print_grammar: bool,

    /// Do not print index comments in the generated tables.
    #[arg(short = 'l')]
    no_line_comments: bool,

    /// Show conflicts resolved by precedence rules.
    #[arg(short = 'p')]
    show_precedence_conflicts: bool,

    /// (Quiet) Don't write the report file.
    #[arg(short = 'q')]
    quiet: bool,

    /// Do not sort or renumber states.
    #[arg(short = 'r')]
    no_resort: bool,

    /// Print parser statistics to standard output.
    #[arg(short = 's')]
    statistics: bool,

    /// Generate the *.sql file describing the parser tables.
    #[arg(short = 'S')]
    sql: bool,

    /// Print the version number.
    #[arg(short = 'x')]
    show_version: bool,

    /// Specify a template file.
    #[arg(short = 'T', value_name = "FILE")]
    template: Option<PathBuf>,

    /// The grammar definition file.
    input: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    if args.show_version {
        println!("citron version {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }
    let Some(input) = args.input.clone() else {
        anyhow::bail!("exactly one grammar filename argument is required");
    };

    let s = Instant::now();
    let outcome = process_file(&args, &input)
        .with_context(|| anyhow::anyhow!("errored during processing {}", input.display()))?;
    tracing::info!("total: {:?} elapsed", s.elapsed());

    Ok(outcome)
}

fn out_path(args: &Args, input: &Path, extension: &str) -> PathBuf {
    let dir = args
        .output_dir
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(input.file_name().unwrap_or_default())
        .with_extension(extension)
}

fn process_file(args: &Args, input: &Path) -> anyhow::Result<ExitCode> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("can't read file {}", input.display()))?;
    let defines: citron::preprocess::Defines = args.define.iter().cloned().collect();
    let text = citron::preprocess::preprocess(&text, &defines)?;
    if args.print_preprocessed {
        print!("{}", text);
        return Ok(ExitCode::SUCCESS);
    }

    let mut grammar = Grammar::new(input.display().to_string());
    citron::syntax::parse(&mut grammar, &text);
    if grammar.error_count > 0 {
        eprintln!("{} error(s) while parsing the grammar.", grammar.error_count);
        return Ok(ExitCode::FAILURE);
    }
    if grammar.nrule() == 0 {
        eprintln!("Empty grammar.");
        return Ok(ExitCode::FAILURE);
    }

    if args.print_grammar {
        grammar.finalize()?;
        print!("{}", citron::report::reprint(&grammar));
        return Ok(ExitCode::SUCCESS);
    }

    let options = citron::Options {
        compress: !args.no_compress,
        resort: !args.no_resort,
    };
    let (automaton, tables) = citron::compute(&mut grammar, options)?;

    if !args.quiet {
        let report = Report::new(
            &grammar,
            &automaton,
            ReportOptions {
                basis_only: args.basis_only,
                show_precedence_conflicts: args.show_precedence_conflicts,
            },
        );
        fs::write(out_path(args, input, "out"), report.to_string())?;
    }

    let template = match &args.template {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("can't read template {}", path.display()))?,
        ),
        None => None,
    };
    let mut codegen = Codegen::new(&grammar, &tables);
    if let Some(template) = &template {
        codegen = codegen.with_template(template);
    }
    if args.no_line_comments {
        codegen = codegen.without_line_comments();
    }
    fs::write(out_path(args, input, "rs"), codegen.to_string())?;

    if args.sql {
        fs::write(
            out_path(args, input, "sql"),
            citron::report::sql_dump(&grammar).to_string(),
        )?;
    }

    if args.statistics {
        print!("{}", citron::codegen::stats(&grammar, &tables));
    }
    if grammar.conflict_count > 0 {
        eprintln!("{} parsing conflicts.", grammar.conflict_count);
    }

    if grammar.error_count > 0 || grammar.conflict_count > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
