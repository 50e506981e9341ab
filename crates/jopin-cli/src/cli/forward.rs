use std::path::PathBuf;

/// Watch settings requested on the command line.
///
/// These flags belong to the supervisor: the runtime never sees them, since
/// the supervisor and not the runtime owns the restart loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchFlags {
    /// `--watch`, `--hot` or `--watch-path` was given
    pub force_watch: bool,
    /// `Some(true)` after `--hot`, `Some(false)` after `--watch`; the last flag wins
    pub hot: Option<bool>,
    /// Directories given through `--watch-path`
    pub watch_paths: Vec<PathBuf>,
}

/// Remove the supervisor's watch flags from the forwarded argument list.
///
/// Accepts `--watch-path <dir>` and `--watch-path=<dir>`. Order of the
/// remaining arguments is preserved.
pub fn split_watch_flags(args: &[String]) -> (Vec<String>, WatchFlags) {
    let mut flags = WatchFlags::default();
    let mut forwarded = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--hot" => {
                flags.force_watch = true;
                flags.hot = Some(true);
            }
            "--watch" => {
                flags.force_watch = true;
                flags.hot = Some(false);
            }
            "--watch-path" => {
                if let Some(dir) = iter.next() {
                    flags.force_watch = true;
                    flags.watch_paths.push(PathBuf::from(dir));
                }
            }
            other => match other.strip_prefix("--watch-path=") {
                Some(dir) if !dir.is_empty() => {
                    flags.force_watch = true;
                    flags.watch_paths.push(PathBuf::from(dir));
                }
                Some(_) => {}
                None => forwarded.push(arg.clone()),
            },
        }
    }

    (forwarded, flags)
}
