//! デプロイ済みサービスセットの記録

/// 1回の実行でデプロイが完了したサービスセット（完了順、追記のみ）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployedSetRegistry {
    sets: Vec<String>,
}

impl DeployedSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>) {
        self.sets.push(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.iter().any(|set| set == name)
    }

    /// `requires` のうち未デプロイの最初のもの
    pub fn first_missing<'a>(&self, requires: &'a [String]) -> Option<&'a str> {
        requires
            .iter()
            .find(|required| !self.contains(required))
            .map(String::as_str)
    }

    pub fn sets(&self) -> &[String] {
        &self.sets
    }

    pub fn into_sets(self) -> Vec<String> {
        self.sets
    }
}
