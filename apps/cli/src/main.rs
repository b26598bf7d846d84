//! # OSC CLI
//!
//! Command-line interface for the operational-space posture controller.
//!
//! ```bash
//! # 检查配置文件
//! osc-cli check --config controller.toml
//!
//! # 闭环仿真（线性化 7 自由度机械臂）
//! osc-cli simulate --config controller.toml --steps 4000 --delta 0.05,0,0.02,0,0,0.1
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckCommand, SimulateCommand};

/// OSC CLI - 操作空间控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "osc-cli")]
#[command(about = "Check controller configs and run closed-loop simulations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 加载并验证配置文件
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 运行闭环仿真
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("osc_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
    }
}
