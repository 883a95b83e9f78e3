use super::controller::AbortSignal;

/// Folds optional signals into one that aborts when any of them does.
///
/// Absent entries are skipped. No signals gives `None`; a single signal is
/// returned as is. For two or more, the inputs are scanned in order first and
/// the first one already aborted decides the reason, with no observer
/// registered anywhere. Otherwise the first input to abort later decides it.
pub fn any_signal<I>(signals: I) -> Option<AbortSignal>
where
    I: IntoIterator<Item = Option<AbortSignal>>,
{
    let mut signals: Vec<AbortSignal> = signals.into_iter().flatten().collect();
    if signals.len() <= 1 {
        return signals.pop();
    }

    let derived = AbortSignal::derived();

    if let Some(reason) = signals.iter().find_map(AbortSignal::reason) {
        log::debug!("combining {} signals, input already aborted: {}", signals.len(), reason);
        derived.abort(reason);
        return Some(derived);
    }

    // A pending derived input only forwards its own sources, so listen to those
    // directly; the input itself may then be dropped.
    let sources: Vec<AbortSignal> = signals
        .iter()
        .flat_map(|s| s.derived_sources().unwrap_or_else(|| vec![s.clone()]))
        .collect();
    follow(&derived, &sources);

    Some(derived)
}

/// Registers one observer per source. Observers hold `derived` weakly.
fn follow(derived: &AbortSignal, sources: &[AbortSignal]) {
    for source in sources {
        let target = derived.downgrade();
        let subscription = source.on_abort(move |reason| {
            if let Some(target) = target.upgrade() {
                target.abort(reason.clone());
            }
        });
        match subscription {
            Some(subscription) => derived.retain_source(subscription),
            // Source aborted between the scan and registration.
            None => break,
        }
    }
}
