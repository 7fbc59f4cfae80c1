//! Sequential bulk execution of a remote check over an ordered item list.
//!
//! Items are strictly serialized: the target service treats concurrent
//! checks from one caller as a single IP-wide signal, so no two items may
//! ever be in flight at once. A per-item failure is recorded and the run
//! continues; there is no mid-run cancellation.

use std::future::Future;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Banned,
    NotBanned,
    Error(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub checked: usize,
    pub banned: usize,
    pub not_banned: usize,
    pub errors: usize,
}

impl BatchSummary {
    fn tally(&mut self, outcome: &CheckOutcome) {
        self.checked += 1;
        match outcome {
            CheckOutcome::Banned => self.banned += 1,
            CheckOutcome::NotBanned => self.not_banned += 1,
            CheckOutcome::Error(_) => self.errors += 1,
        }
    }
}

/// Run `check` over every item in order, one at a time. `progress` fires
/// after each item with `(processed, total)`; the summary and the ordered
/// per-item outcomes are only delivered once the last item has completed.
///
/// The caller is responsible for obtaining user confirmation beforehand and
/// for not double-invoking; re-running is safe but not deduplicated.
pub async fn run_sequential<T, F, Fut, P>(
    items: &[T],
    mut check: F,
    mut progress: P,
) -> (BatchSummary, Vec<CheckOutcome>)
where
    F: FnMut(&T) -> Fut,
    Fut: Future<Output = Result<bool, String>>,
    P: FnMut(usize, usize),
{
    let total = items.len();
    let mut summary = BatchSummary::default();
    let mut outcomes = Vec::with_capacity(total);

    for item in items {
        let outcome = match check(item).await {
            Ok(true) => CheckOutcome::Banned,
            Ok(false) => CheckOutcome::NotBanned,
            Err(reason) => CheckOutcome::Error(reason),
        };
        summary.tally(&outcome);
        outcomes.push(outcome);
        progress(summary.checked, total);
    }

    (summary, outcomes)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    async fn run_scripted(
        script: Vec<Result<bool, String>>,
    ) -> (BatchSummary, Vec<CheckOutcome>, Vec<(usize, usize)>) {
        let items: Vec<usize> = (0..script.len()).collect();
        let script = RefCell::new(script);
        let progress_calls = RefCell::new(Vec::new());
        let (summary, outcomes) = run_sequential(
            &items,
            |&i| {
                let result = script.borrow_mut()[i].clone();
                async move { result }
            },
            |processed, total| progress_calls.borrow_mut().push((processed, total)),
        )
        .await;
        (summary, outcomes, progress_calls.into_inner())
    }

    #[tokio::test]
    async fn totals_add_up_for_mixed_outcomes() {
        let (summary, outcomes, _) = run_scripted(vec![
            Ok(true),
            Ok(false),
            Err("timeout".into()),
        ])
        .await;
        assert_eq!(
            summary,
            BatchSummary {
                checked: 3,
                banned: 1,
                not_banned: 1,
                errors: 1
            }
        );
        assert_eq!(
            outcomes,
            vec![
                CheckOutcome::Banned,
                CheckOutcome::NotBanned,
                CheckOutcome::Error("timeout".into())
            ]
        );
    }

    #[tokio::test]
    async fn mid_run_error_does_not_stop_later_items() {
        let (summary, outcomes, _) = run_scripted(vec![
            Err("boom".into()),
            Ok(false),
            Ok(false),
            Ok(true),
        ])
        .await;
        assert_eq!(summary.checked, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[3], CheckOutcome::Banned);
    }

    #[tokio::test]
    async fn progress_is_strictly_increasing_and_ends_at_total() {
        let (_, _, progress) =
            run_scripted(vec![Ok(false), Ok(false), Err("x".into()), Ok(true), Ok(false)]).await;
        assert_eq!(
            progress,
            vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]
        );
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_summary_and_no_progress() {
        let (summary, outcomes, progress) = run_scripted(Vec::new()).await;
        assert_eq!(summary, BatchSummary::default());
        assert!(outcomes.is_empty());
        assert!(progress.is_empty());
    }

    #[tokio::test]
    async fn items_run_one_at_a_time_in_input_order() {
        let order = RefCell::new(Vec::new());
        let items = vec!["a", "b", "c"];
        let (summary, _) = run_sequential(
            &items,
            |&name| {
                order.borrow_mut().push(format!("start {name}"));
                let order = &order;
                async move {
                    // Yield so interleaving would show up if anything ran
                    // concurrently.
                    tokio::task::yield_now().await;
                    order.borrow_mut().push(format!("end {name}"));
                    Ok(false)
                }
            },
            |_, _| {},
        )
        .await;
        assert_eq!(summary.checked, 3);
        assert_eq!(
            order.into_inner(),
            vec!["start a", "end a", "start b", "end b", "start c", "end c"]
        );
    }
}
