use crate::{script::SYNC_FAILED_FN, shell_path, shell_quote, EffectiveRef, SessionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
  EnterWorkingDirectory,
  CheckoutDefault,
  PullDefault,
  DeleteStaleBranch,
  Fetch,
  CheckoutRef,
}

impl SyncStage {
  pub fn name(&self) -> &'static str {
    match self {
      Self::EnterWorkingDirectory => "enter-working-directory",
      Self::CheckoutDefault => "checkout-default",
      Self::PullDefault => "pull-default",
      Self::DeleteStaleBranch => "delete-stale-branch",
      Self::Fetch => "fetch",
      Self::CheckoutRef => "checkout-ref",
    }
  }
}

impl std::fmt::Display for SyncStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// How the remote working copy is brought to the effective ref.
///
/// Both plans start from a checkout of the default branch. A non-default ref
/// never reuses a local branch of the same name: the working copy is only a
/// cache of the repository, so the local branch is dropped and recreated from
/// the freshly fetched remote branch.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
  Default {
    default_ref: String,
  },
  Branch {
    default_ref: String,
    reference: EffectiveRef,
  },
}

impl SyncPlan {
  pub fn for_ref(reference: &EffectiveRef, default_ref: &str) -> Self {
    if reference.is_default(default_ref) {
      Self::Default {
        default_ref: default_ref.to_string(),
      }
    } else {
      Self::Branch {
        default_ref: default_ref.to_string(),
        reference: reference.clone(),
      }
    }
  }

  /// Git stages in execution order, after entering the working directory.
  pub fn stages(&self) -> Vec<SyncStage> {
    match self {
      Self::Default { .. } => vec![SyncStage::CheckoutDefault, SyncStage::PullDefault],
      Self::Branch { .. } => vec![
        SyncStage::CheckoutDefault,
        SyncStage::DeleteStaleBranch,
        SyncStage::Fetch,
        SyncStage::CheckoutRef,
      ],
    }
  }

  fn default_ref(&self) -> &str {
    match self {
      Self::Default { default_ref } | Self::Branch { default_ref, .. } => default_ref,
    }
  }

  /// Every statement aborts the script through the sync failure marker when
  /// its command exits non-zero.
  pub fn statements(&self, ctx: &SessionContext) -> Vec<String> {
    let mut statements = vec![guarded(
      format!("cd {}", shell_path(&ctx.working_directory)),
      SyncStage::EnterWorkingDirectory,
    )];

    statements.extend(
      self
        .stages()
        .into_iter()
        .map(|stage| self.stage_statement(stage, ctx)),
    );

    statements
  }

  fn stage_statement(&self, stage: SyncStage, ctx: &SessionContext) -> String {
    let default_ref = shell_quote(self.default_ref());
    let remote = shell_quote(&ctx.remote);

    match (stage, self) {
      (SyncStage::CheckoutDefault, _) => guarded(format!("git checkout {}", default_ref), stage),
      (SyncStage::PullDefault, _) => guarded(
        format!("git pull --ff-only {} {}", remote, default_ref),
        stage,
      ),
      (SyncStage::Fetch, _) => guarded(format!("git fetch {}", remote), stage),
      (SyncStage::DeleteStaleBranch, Self::Branch { reference, .. }) => format!(
        "if git show-ref --verify --quiet {}; then {}; fi",
        shell_quote(&format!("refs/heads/{}", reference)),
        guarded(format!("git branch -D {}", shell_quote(reference.as_str())), stage)
      ),
      (SyncStage::CheckoutRef, Self::Branch { reference, .. }) => guarded(
        format!(
          "git checkout -b {} --track {}",
          shell_quote(reference.as_str()),
          shell_quote(&format!("{}/{}", ctx.remote, reference))
        ),
        stage,
      ),
      // `stages` never yields these for this plan
      (SyncStage::DeleteStaleBranch | SyncStage::CheckoutRef, Self::Default { .. })
      | (SyncStage::EnterWorkingDirectory, _) => ":".to_string(),
    }
  }
}

fn guarded(command: String, stage: SyncStage) -> String {
  format!("{} || {} {} \"$?\"", command, SYNC_FAILED_FN, stage.name())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn plan(reference: &str) -> SyncPlan {
    SyncPlan::for_ref(&EffectiveRef::new(reference), "master")
  }

  #[test]
  fn test_master_plan() {
    let plan = plan("master");

    assert_eq!(
      plan,
      SyncPlan::Default {
        default_ref: "master".to_string()
      }
    );
    assert_eq!(
      plan.stages(),
      vec![SyncStage::CheckoutDefault, SyncStage::PullDefault]
    );
  }

  #[test]
  fn test_branch_plan() {
    assert_eq!(
      plan("feature-x").stages(),
      vec![
        SyncStage::CheckoutDefault,
        SyncStage::DeleteStaleBranch,
        SyncStage::Fetch,
        SyncStage::CheckoutRef,
      ]
    );
  }

  #[test]
  fn test_every_plan_starts_with_default_checkout() {
    for reference in ["master", "feature-x", "main", "release/1.0", "; rm -rf /", " "] {
      let plan = plan(reference);
      assert_eq!(plan.stages()[0], SyncStage::CheckoutDefault, "{}", reference);

      let statements = plan.statements(&SessionContext::new("~/repo"));
      assert!(statements[0].starts_with("cd "));
      assert!(statements[1].starts_with("git checkout 'master' ||"));
    }
  }

  #[test]
  fn test_master_statements() {
    let statements = plan("master").statements(&SessionContext::new("~/devito"));

    assert_eq!(
      statements,
      vec![
        "cd \"$HOME\"/'devito' || remote_ci_sync_failed enter-working-directory \"$?\"",
        "git checkout 'master' || remote_ci_sync_failed checkout-default \"$?\"",
        "git pull --ff-only 'origin' 'master' || remote_ci_sync_failed pull-default \"$?\"",
      ]
    );
  }

  #[test]
  fn test_branch_statements() {
    let ctx = SessionContext::new("/srv/devito").remote("upstream");
    let statements = plan("feature-x").statements(&ctx);

    assert_eq!(
      statements,
      vec![
        "cd '/srv/devito' || remote_ci_sync_failed enter-working-directory \"$?\"",
        "git checkout 'master' || remote_ci_sync_failed checkout-default \"$?\"",
        "if git show-ref --verify --quiet 'refs/heads/feature-x'; then git branch -D 'feature-x' || remote_ci_sync_failed delete-stale-branch \"$?\"; fi",
        "git fetch 'upstream' || remote_ci_sync_failed fetch \"$?\"",
        "git checkout -b 'feature-x' --track 'upstream/feature-x' || remote_ci_sync_failed checkout-ref \"$?\"",
      ]
    );
  }

  #[test]
  fn test_hostile_ref_stays_quoted() {
    let statements = plan("x'; touch pwned; '").statements(&SessionContext::new("/repo"));

    assert!(statements[2].contains("'refs/heads/x'\\''; touch pwned; '\\'''"));
    assert!(statements[4].contains("'x'\\''; touch pwned; '\\'''"));
  }

  #[test]
  fn test_custom_default_ref() {
    let plan = SyncPlan::for_ref(&EffectiveRef::new("main"), "main");
    let statements = plan.statements(&SessionContext::new("/repo"));

    assert_eq!(plan.stages().len(), 2);
    assert!(statements[1].starts_with("git checkout 'main'"));
    assert!(statements[2].contains("'origin' 'main'"));
  }
}
