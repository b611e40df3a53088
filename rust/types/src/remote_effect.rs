/// How far a composite remote operation got before it failed.
///
/// Provisioning (config-set then collection), indexing (add then commit) and
/// collection deletion (collection then config-set) are sequences of remote
/// calls without rollback. Their errors say whether the cluster was left
/// untouched or partially changed, so that callers know a retry of the same
/// operation is what brings it back to a consistent state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteEffect {
    /// The failure happened before anything was changed remotely.
    None,
    /// Some steps were applied. Re-running the operation completes it.
    Partial,
}

impl RemoteEffect {
    pub fn is_partial(&self) -> bool {
        matches!(self, RemoteEffect::Partial)
    }
}
