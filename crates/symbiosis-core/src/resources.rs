//! Payoff game splitting a host's resources with its symbionts.
//!
//! Every function here is pure: callers decide whose points the results land on.

/// Outcome of one symbiont's share of a host's resources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exchange {
    /// Points credited to the host.
    pub host: f64,
    /// Points credited to the symbiont.
    pub symbiont: f64,
}

/// Host gain when it has no symbionts: whatever it spends on donation or
/// defence against an absent partner is lost.
#[must_use]
pub fn solo(resources: f64, host_val: f64) -> f64 {
    resources * (1.0 - host_val.abs())
}

/// Split `share` between a host and one symbiont.
///
/// # Panics
/// Panics if either interaction value is NaN; the four branches partition every other
/// pair of values.
#[must_use]
pub fn exchange(share: f64, host_val: f64, sym_val: f64, synergy: f64) -> Exchange {
    if host_val >= 0.0 && sym_val >= 0.0 {
        let donation = share * host_val;
        let returned = donation * sym_val;
        Exchange {
            host: (share - donation) + synergy * returned,
            symbiont: donation - returned,
        }
    } else if host_val <= 0.0 && sym_val < 0.0 {
        let remaining = share - host_val.abs() * share;
        if sym_val < host_val {
            let stolen = (host_val - sym_val) * remaining;
            Exchange {
                host: remaining - stolen,
                symbiont: stolen,
            }
        } else {
            Exchange {
                host: remaining,
                symbiont: 0.0,
            }
        }
    } else if host_val > 0.0 && sym_val < 0.0 {
        let donation = host_val * share;
        let kept = share - donation;
        let stolen = sym_val.abs() * kept;
        Exchange {
            host: kept - stolen,
            symbiont: donation + stolen,
        }
    } else if host_val < 0.0 && sym_val >= 0.0 {
        Exchange {
            host: share - host_val.abs() * share,
            symbiont: 0.0,
        }
    } else {
        panic!("interaction pair ({host_val}, {sym_val}) escaped every payoff branch");
    }
}
