//! Contributor directory lookup.

use crate::config::Contributor;

/// Resolves a contributor handle to a wallet address across both pools.
///
/// The leaders pool is searched before the active pool, so a handle
/// present in both resolves to its leaders entry. Absence is `None`,
/// never an error.
#[must_use]
pub fn resolve_wallet<'a>(
    leaders: &'a [Contributor],
    active: &'a [Contributor],
    handle: &str,
) -> Option<&'a str> {
    leaders
        .iter()
        .chain(active.iter())
        .find(|contributor| contributor.handle == handle)
        .map(|contributor| contributor.wallet.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributor(handle: &str, wallet: &str) -> Contributor {
        Contributor {
            handle: handle.to_string(),
            wallet: wallet.to_string(),
        }
    }

    #[test]
    fn leaders_take_precedence_over_active() {
        let leaders = vec![contributor("alice", "0xleader")];
        let active = vec![contributor("alice", "0xactive"), contributor("bob", "0xbob")];

        assert_eq!(resolve_wallet(&leaders, &active, "alice"), Some("0xleader"));
        assert_eq!(resolve_wallet(&leaders, &active, "bob"), Some("0xbob"));
    }

    #[test]
    fn unknown_handle_is_none() {
        let leaders = vec![contributor("alice", "0xleader")];
        assert_eq!(resolve_wallet(&leaders, &[], "mallory"), None);
    }

    #[test]
    fn empty_pools_resolve_nothing() {
        assert_eq!(resolve_wallet(&[], &[], "alice"), None);
    }
}
