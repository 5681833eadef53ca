/// Check if a sender is allowed to interact with the bot.
///
/// An empty allow-list means everyone is allowed (public mode).
pub fn permit(sender_id: i64, allow_list: &[i64]) -> bool {
    allow_list.is_empty() || allow_list.contains(&sender_id)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(-1001234)]
    fn empty_allow_list_allows_everyone(#[case] id: i64) {
        assert!(permit(id, &[]));
    }

    #[rstest]
    #[case(1, true)]
    #[case(2, true)]
    #[case(3, true)]
    #[case(4, false)]
    #[case(-1, false)]
    fn membership_decides(#[case] id: i64, #[case] expected: bool) {
        assert_eq!(permit(id, &[1, 2, 3]), expected);
    }
}
