use runboard_core::model::{ClientTokenUsage, TaskData, TokenUsage};

/// Sum token usage across the tasks that carry it. `None` means no task had
/// token data at all; callers must treat that as "unavailable", not zero.
pub fn compute_total_token_usage<'a, I>(tasks: I) -> Option<TokenUsage>
where
    I: IntoIterator<Item = &'a TaskData>,
{
    let mut total = TokenUsage::default();
    let mut counted = 0usize;
    for usage in tasks.into_iter().filter_map(|t| t.token_usage.as_ref()) {
        counted += 1;
        for (name, client) in &usage.clients {
            let entry = total
                .clients
                .entry(name.clone())
                .or_insert_with(ClientTokenUsage::default);
            entry.total_input_tokens += client.total_input_tokens;
            entry.total_output_tokens += client.total_output_tokens;
            entry.total_tokens += client.total_tokens;
            // individual requests are concatenated, never re-aggregated
            entry.requests.extend(client.requests.iter().cloned());
        }
        total.grand_total.total_input_tokens += usage.grand_total.total_input_tokens;
        total.grand_total.total_output_tokens += usage.grand_total.total_output_tokens;
        total.grand_total.total_tokens += usage.grand_total.total_tokens;
        total.grand_total.total_requests += usage.grand_total.total_requests;
    }
    (counted > 0).then_some(total)
}

/// Per-task mean of the totals above, over the tasks that had token data.
/// Request lists are emptied: individual requests cannot be averaged.
pub fn compute_mean_token_usage<'a, I>(tasks: I) -> Option<TokenUsage>
where
    I: IntoIterator<Item = &'a TaskData>,
{
    let tasks: Vec<&TaskData> = tasks.into_iter().collect();
    let counted = tasks
        .iter()
        .filter(|t| t.token_usage.is_some())
        .count() as u64;
    let mut mean = compute_total_token_usage(tasks.iter().copied())?;
    for client in mean.clients.values_mut() {
        client.total_input_tokens /= counted;
        client.total_output_tokens /= counted;
        client.total_tokens /= counted;
        client.requests.clear();
    }
    mean.grand_total.total_input_tokens /= counted;
    mean.grand_total.total_output_tokens /= counted;
    mean.grand_total.total_tokens /= counted;
    mean.grand_total.total_requests /= counted;
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_task;
    use runboard_core::model::{TokenRequest, TokenTotals};
    use std::collections::BTreeMap;

    fn usage(client: &str, input: u64, output: u64, requests: usize) -> TokenUsage {
        let mut clients = BTreeMap::new();
        clients.insert(
            client.to_string(),
            ClientTokenUsage {
                total_input_tokens: input,
                total_output_tokens: output,
                total_tokens: input + output,
                requests: vec![
                    TokenRequest {
                        input_tokens: input / requests.max(1) as u64,
                        output_tokens: output / requests.max(1) as u64,
                        total_tokens: (input + output) / requests.max(1) as u64,
                    };
                    requests
                ],
            },
        );
        TokenUsage {
            clients,
            grand_total: TokenTotals {
                total_input_tokens: input,
                total_output_tokens: output,
                total_tokens: input + output,
                total_requests: requests as u64,
            },
        }
    }

    #[test]
    fn no_token_data_propagates_absence_not_zero() {
        let tasks = vec![make_task("t1", 1.0), make_task("t2", 0.0)];
        assert!(compute_total_token_usage(tasks.iter()).is_none());
        assert!(compute_mean_token_usage(tasks.iter()).is_none());
    }

    #[test]
    fn totals_merge_clients_and_concatenate_requests() {
        let mut t1 = make_task("t1", 1.0);
        t1.token_usage = Some(usage("orchestrator", 1000, 200, 2));
        let mut t2 = make_task("t2", 0.0);
        t2.token_usage = Some(usage("orchestrator", 3000, 400, 3));
        let t3 = make_task("t3", 0.5); // no usage; must not dilute the sums

        let tasks = vec![t1, t2, t3];
        let total = compute_total_token_usage(tasks.iter()).expect("usage present");
        assert_eq!(total.grand_total.total_input_tokens, 4000);
        assert_eq!(total.grand_total.total_output_tokens, 600);
        assert_eq!(total.grand_total.total_tokens, 4600);
        assert_eq!(total.grand_total.total_requests, 5);
        let client = &total.clients["orchestrator"];
        assert_eq!(client.total_tokens, 4600);
        assert_eq!(client.requests.len(), 5);
    }

    #[test]
    fn mean_divides_by_tasks_with_usage_and_drops_requests() {
        let mut t1 = make_task("t1", 1.0);
        t1.token_usage = Some(usage("web_surfer", 1000, 100, 1));
        let mut t2 = make_task("t2", 0.0);
        t2.token_usage = Some(usage("web_surfer", 2001, 100, 1));
        let t3 = make_task("t3", 0.5);

        let tasks = vec![t1, t2, t3];
        let mean = compute_mean_token_usage(tasks.iter()).expect("usage present");
        // integer division over the two tasks that carried usage
        assert_eq!(mean.grand_total.total_input_tokens, 1500);
        assert_eq!(mean.grand_total.total_output_tokens, 100);
        assert_eq!(mean.grand_total.total_requests, 1);
        let client = &mean.clients["web_surfer"];
        assert_eq!(client.total_input_tokens, 1500);
        assert!(client.requests.is_empty());
    }
}
