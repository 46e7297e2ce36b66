//! 在合成体模上运行上下文构建与全部测量模块, 并打印结果.
//!
//! 环境变量:
//!
//! 1. `$ACR_SANITY_NOISE`: 高斯噪声标准差, 默认 2;
//! 2. `$ACR_SANITY_SEED`: 随机数种子, 默认 42.

mod result;
mod runner;
mod synth;

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();

    let result = runner::run();
    result.analyze();
    if result.failures() > 0 {
        std::process::exit(1);
    }
}
