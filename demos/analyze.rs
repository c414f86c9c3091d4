use clap::{Parser, ValueEnum};

use dataflow_rs::analysis::{AnalysisConfig, AnalysisResult, BackwardAnalysis, ForwardAnalysis};
use dataflow_rs::cfg::{BinaryOp, CfgBuilder, ComparisonOp, ControlFlowGraph};
use dataflow_rs::constant_propagation::ConstantPropagationTransfer;
use dataflow_rs::live_variables::LiveVariableTransfer;
use dataflow_rs::reaching_definitions::ReachingDefinitionTransfer;
use dataflow_rs::store::Store;
use dataflow_rs::value::AbstractValue;
use dataflow_rs::visualize::{DotCfgVisualizer, DotConfig, StringCfgVisualizer};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Program {
    /// x = 1; y = 2; if (c) { x = 3; } z = x;
    Branch,
    /// x = 0; while (x < n) { x = x + 1; } return x;
    Loop,
    /// x = 1; try { foo(); x = 2; } catch (RuntimeException e) { y = x; }
    TryCatch,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Analysis {
    Constants,
    ReachingDefinitions,
    LiveVariables,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Program to analyze.
    #[arg(value_enum, default_value = "branch")]
    program: Program,

    /// Analysis to run.
    #[clap(long, value_enum, default_value = "constants")]
    analysis: Analysis,

    /// Widen after this many visits of a block.
    #[clap(long, value_name = "INT")]
    widen_after: Option<usize>,

    /// Exception causes whose edges are not followed.
    #[clap(long, value_name = "CAUSE")]
    ignore: Vec<String>,

    /// Print Graphviz DOT instead of text.
    #[clap(long)]
    dot: bool,

    /// Leave stores out of the DOT output.
    #[clap(long)]
    no_stores: bool,
}

fn build(program: Program) -> color_eyre::Result<ControlFlowGraph> {
    let cfg = match program {
        Program::Branch => {
            let mut b = CfgBuilder::method("branch", &["c"]);
            let start = b.regular_block();
            let one = b.int(start, 1);
            b.assign(start, "x", one);
            let two = b.int(start, 2);
            b.assign(start, "y", two);
            b.local(start, "c");
            let test = b.conditional_block();
            let then_block = b.regular_block();
            let three = b.int(then_block, 3);
            b.assign(then_block, "x", three);
            let join = b.regular_block();
            let x = b.local(join, "x");
            b.assign(join, "z", x);
            b.connect(b.entry(), start);
            b.connect(start, test);
            b.branch(test, then_block, join);
            b.connect(then_block, join);
            b.connect(join, b.exit());
            b.build()?
        }
        Program::Loop => {
            let mut b = CfgBuilder::method("count", &["n"]);
            let init = b.regular_block();
            let zero = b.int(init, 0);
            b.assign(init, "x", zero);
            let head = b.regular_block();
            let x = b.local(head, "x");
            let n = b.local(head, "n");
            b.compare(head, ComparisonOp::Lt, x, n);
            let test = b.conditional_block();
            let body = b.regular_block();
            let x = b.local(body, "x");
            let one = b.int(body, 1);
            let sum = b.binary(body, BinaryOp::Add, x, one);
            b.assign(body, "x", sum);
            let done = b.regular_block();
            let x = b.local(done, "x");
            b.ret(done, Some(x));
            b.connect(b.entry(), init);
            b.connect(init, head);
            b.connect(head, test);
            b.branch(test, body, done);
            b.connect(body, head);
            b.connect(done, b.exit());
            b.build()?
        }
        Program::TryCatch => {
            let mut b = CfgBuilder::method("guarded", &[]);
            let start = b.regular_block();
            let one = b.int(start, 1);
            b.assign(start, "x", one);
            let call = b.exception_block();
            b.call(call, "foo", None, &[]);
            let rest = b.regular_block();
            let two = b.int(rest, 2);
            b.assign(rest, "x", two);
            let handler = b.regular_block();
            let x = b.local(handler, "x");
            b.assign(handler, "y", x);
            b.connect(b.entry(), start);
            b.connect(start, call);
            b.connect(call, rest);
            b.throws(call, "java.lang.RuntimeException", handler);
            b.connect(rest, b.exit());
            b.connect(handler, b.exit());
            b.build()?
        }
    };
    Ok(cfg)
}

fn render<V, S>(args: &Cli, cfg: &ControlFlowGraph, result: &AnalysisResult<V, S>) -> color_eyre::Result<String>
where
    V: AbstractValue + std::fmt::Display,
    S: Store,
{
    if args.dot {
        let config = DotConfig {
            show_stores: !args.no_stores,
            ..DotConfig::default()
        };
        Ok(DotCfgVisualizer::new(config).visualize(cfg, Some(result))?)
    } else {
        Ok(StringCfgVisualizer.visualize(cfg, Some(result)))
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    eprintln!("args = {:?}", args);

    let cfg = build(args.program)?;
    eprintln!("Built {} blocks, {} nodes", cfg.num_blocks(), cfg.num_nodes());

    let mut config = AnalysisConfig::default();
    if let Some(max) = args.widen_after {
        config = config.with_widening(max);
    }
    for cause in &args.ignore {
        config = config.ignore_exception_type(cause);
    }

    let output = match args.analysis {
        Analysis::Constants => {
            let result = ForwardAnalysis::new(ConstantPropagationTransfer, config).perform_analysis(&cfg)?;
            render(&args, &cfg, &result)?
        }
        Analysis::ReachingDefinitions => {
            let result = ForwardAnalysis::new(ReachingDefinitionTransfer, config).perform_analysis(&cfg)?;
            render(&args, &cfg, &result)?
        }
        Analysis::LiveVariables => {
            let result = BackwardAnalysis::new(LiveVariableTransfer, config).perform_analysis(&cfg)?;
            render(&args, &cfg, &result)?
        }
    };
    println!("{}", output);

    eprintln!("Done in {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
