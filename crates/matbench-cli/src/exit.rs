// Process exit codes. Library errors carry their own via `BenchError::exit_code`
// (-1 arguments, -2 kernel execution, -3 readback); negative codes surface as
// 255/254/253 on Unix.
pub use matbench::error::{EXIT_FATAL, EXIT_INVALID_ARGUMENTS};

pub const EXIT_SUCCESS: i32 = 0;
