/// Identities currently registered on the primary channel, in server order.
/// Always replaced wholesale; never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    users: Vec<String>,
}

impl PresenceSet {
    pub fn replace(&mut self, users: Vec<String>) {
        let mut next: Vec<String> = Vec::with_capacity(users.len());
        for user in users {
            if !user.is_empty() && !next.contains(&user) {
                next.push(user);
            }
        }
        self.users = next;
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.users.iter().any(|u| u == identity)
    }

    /// Everyone a private message could be addressed to.
    pub fn receiver_candidates<'a>(&'a self, me: &'a str) -> impl Iterator<Item = &'a str> {
        self.users.iter().map(String::as_str).filter(move |u| *u != me)
    }

    /// The only possible receiver, if there is exactly one.
    pub fn sole_receiver<'a>(&'a self, me: &'a str) -> Option<&'a str> {
        let mut candidates = self.receiver_candidates(me);
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }
}
