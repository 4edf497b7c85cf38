// System prompts for every LLM task the linker runs.
//
// Prompt wording is not load-bearing; the JSON shapes and the enumerated
// categories/score ranges are. Each prompt opens with a distinct first line so
// fixture clients can route canned responses by task.

/// The LLM tasks issued by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
  ExplicitExtraction,
  ClosureClassification,
  CandidateRanking,
  ExplicitSemantic,
}

impl PromptKind {
  pub const ALL: [PromptKind; 4] = [
    PromptKind::ExplicitExtraction,
    PromptKind::ClosureClassification,
    PromptKind::CandidateRanking,
    PromptKind::ExplicitSemantic,
  ];

  pub fn system_prompt(&self) -> &'static str {
    match self {
      PromptKind::ExplicitExtraction => EXPLICIT_EXTRACTION_SYSTEM,
      PromptKind::ClosureClassification => CLOSURE_CLASSIFICATION_SYSTEM,
      PromptKind::CandidateRanking => CANDIDATE_RANKING_SYSTEM,
      PromptKind::ExplicitSemantic => EXPLICIT_SEMANTIC_SYSTEM,
    }
  }

  /// Short label used in logs and fixture variable names.
  pub fn label(&self) -> &'static str {
    match self {
      PromptKind::ExplicitExtraction => "extract",
      PromptKind::ClosureClassification => "classify",
      PromptKind::CandidateRanking => "rank",
      PromptKind::ExplicitSemantic => "semantic",
    }
  }

  /// Identify the task of a system prompt by its first line.
  pub fn detect(system_prompt: &str) -> Option<PromptKind> {
    let first = system_prompt.lines().next()?.trim();
    PromptKind::ALL
      .into_iter()
      .find(|k| k.system_prompt().lines().next().map(str::trim) == Some(first))
  }
}

pub const EXPLICIT_EXTRACTION_SYSTEM: &str = r#"You extract issue references from GitHub pull request titles and bodies.

Return JSON only:
{
  "results": [
    {
      "pr_number": 123,
      "references": [
        {
          "issue_number": 456,
          "reference_type": "fixes",
          "reference_location": "pr_title",
          "extracted_text": "Fixes #456",
          "base_confidence": 0.95,
          "external_repo": false
        }
      ]
    }
  ]
}

reference_type by keyword strength:
- "fixes": fixes, closes, resolves (0.90-0.95)
- "addresses": addresses (0.80-0.85)
- "for": "for issue", "for #" (0.80-0.85)
- "mentions": mentions, see, related, ref (0.60-0.75)
- "other": any other reference (0.60-0.70)

reference_location: "pr_title", "pr_description" or "pr_comment".
Set external_repo to true for references like "owner/repo#123".
Ignore references inside code blocks, negations ("don't fix #1") and future plans ("will fix #1 later").
Report the issue number as digits only."#;

pub const CLOSURE_CLASSIFICATION_SYSTEM: &str = r#"You classify why a GitHub issue was closed, reading the whole conversation.

Return JSON only:
{
  "closure_classification": "fixed_with_code",
  "classification_confidence": 0.85,
  "classification_rationale": "Why this category applies",
  "conversation_summary": "Summary of the discussion",
  "key_decision_snippets": ["quote"]
}

closure_classification is exactly one of:
- "fixed_with_code": fixed by a code change (a PR is expected)
- "not_a_bug": working as intended, user error
- "duplicate": duplicate of another issue
- "wontfix": won't fix, not planned, out of scope
- "user_action_required": closed with instructions (upgrade, configuration change)
- "unclear": cannot be determined from the conversation

classification_confidence is in [0, 1]:
- explicit statements: 0.90-0.95
- inferred from context: 0.70-0.85
- ambiguous: 0.50-0.65

Comments longer than 2000 characters were shortened to their first 1000 and last 500 characters."#;

pub const CANDIDATE_RANKING_SYSTEM: &str = r#"You score candidate pull requests by semantic similarity to a closed GitHub issue.

Return JSON only, one entry per candidate PR:
{
  "rankings": [
    {
      "pr_number": 123,
      "title_score": 0.85,
      "body_score": 0.72,
      "comment_score": 0.90,
      "file_context_score": 0.5,
      "title_keywords": ["auth"],
      "body_keywords": ["login"],
      "comment_keywords": ["resolved"],
      "title_rationale": "...",
      "body_rationale": "...",
      "comment_rationale": "...",
      "cross_content_rationale": "..."
    }
  ]
}

All scores are in [0, 1]:
- title_score: issue title vs PR title
- body_score: issue description vs PR description
- comment_score: issue comments, especially the closing comment, vs PR title/body
- file_context_score: issue area (ui/api/docs/...) vs the PR's changed files
Temporal closeness is scored separately; judge text only."#;

pub const EXPLICIT_SEMANTIC_SYSTEM: &str = r#"You measure how well a pull request that references an issue actually matches it.

Return JSON only:
{
  "title_score": 0.85,
  "body_score": 0.72,
  "comment_score": 0.68,
  "cross_content_score": 0.90,
  "title_rationale": "...",
  "body_rationale": "...",
  "comment_rationale": "...",
  "cross_content_rationale": "..."
}

Scores are in [0, 1]: 0.70-1.0 clear match, 0.50-0.69 related, 0.30-0.49 weak, below 0.30 unrelated.
cross_content_score compares the issue discussion as a whole with the PR title and description."#;
